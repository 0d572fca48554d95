use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::api::error::ApiError;
use crate::models::StatEstimate;
use crate::utils::{format_compact, parse_compact};

/// Battle-stats service root. The key is a path segment, so request URLs are
/// never logged from this module.
const STATS_BASE_URL: &str = "https://www.tornstats.com/api/v2";

/// Request timeout in seconds. The stats service is slower than Torn itself,
/// but a batch lookup should still never take this long.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Fields the key check recognizes as an "ok" signal, in the order the
/// service has used them across versions.
const OK_SIGNAL_FIELDS: [&str; 3] = ["status", "valid", "success"];

/// Fields that may carry the numeric estimate, in priority order.
const TOTAL_FIELDS: [&str; 3] = ["total", "total_bs", "bs_estimate"];

/// Fields that may carry the display label, in priority order.
const LABEL_FIELDS: [&str; 2] = ["estimate", "estimate_human"];

/// Client for the optional battle-stats enrichment service.
///
/// Clone is cheap - reqwest's Client uses an Arc internally.
#[derive(Clone)]
pub struct StatsClient {
    client: Client,
    key: String,
}

impl StatsClient {
    pub fn new(key: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            key: key.into(),
        })
    }

    /// Whether the configured key is accepted by the service.
    ///
    /// Collapses every failure mode to false: an unreachable service and a
    /// rejected key both mean estimates cannot be fetched this session.
    pub async fn check_key(&self) -> bool {
        let url = format!("{}/{}", STATS_BASE_URL, self.key);
        let body = match self.client.get(&url).send().await {
            Ok(response) => match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(error = %e, "Stats key check: unreadable response");
                    return false;
                }
            },
            Err(e) => {
                debug!(error = %e, "Stats key check: request failed");
                return false;
            }
        };

        match serde_json::from_str::<Value>(&body) {
            Ok(value) => key_check_verdict(&value),
            Err(e) => {
                debug!(error = %e, "Stats key check: response is not JSON");
                false
            }
        }
    }

    /// Fetch estimates for a batch of player ids. Returns only the ids the
    /// service covered; callers fill the gaps with placeholders.
    pub async fn fetch_estimates(
        &self,
        ids: &[u64],
    ) -> Result<HashMap<u64, StatEstimate>, ApiError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let id_list = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
        let url = format!("{}/{}/spies?ids={}", STATS_BASE_URL, self.key, id_list);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, &body));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("estimates: {}", e)))?;
        if let Some(err) = value.get("error").and_then(Value::as_str) {
            return Err(ApiError::InvalidResponse(format!("estimates: {}", err)));
        }

        // The payload is either {"spies": {id: entry}} or a bare id map.
        let entries = value
            .get("spies")
            .and_then(Value::as_object)
            .or_else(|| value.as_object())
            .cloned()
            .unwrap_or_default();

        let mut estimates = HashMap::new();
        for (key, entry) in &entries {
            let Ok(id) = key.parse::<u64>() else { continue };
            if let Some(estimate) = normalize_estimate(entry) {
                estimates.insert(id, estimate);
            }
        }
        debug!(
            requested = ids.len(),
            covered = estimates.len(),
            "Fetched stat estimates"
        );
        Ok(estimates)
    }
}

/// Decide whether a key-check response body accepts the key.
///
/// An explicit error field always rejects. Any known ok-signal field that is
/// boolean true accepts. Known fields present but none true rejects. A body
/// with no known fields at all accepts: older service versions answered with
/// a bare account object, and the absence of a rejection is the only signal
/// they give.
pub fn key_check_verdict(body: &Value) -> bool {
    let Some(obj) = body.as_object() else {
        return false;
    };
    if obj.contains_key("error") {
        return false;
    }

    let mut any_known = false;
    for field in OK_SIGNAL_FIELDS {
        if let Some(v) = obj.get(field) {
            any_known = true;
            if v.as_bool() == Some(true) {
                return true;
            }
        }
    }
    !any_known
}

/// Normalize one estimate entry into a label plus derived numeric total.
///
/// The service has answered with bare numbers, bare strings, and objects in
/// various shapes; every shape funnels through here so the rest of the crate
/// only ever sees `StatEstimate`.
pub fn normalize_estimate(entry: &Value) -> Option<StatEstimate> {
    match entry {
        Value::Number(n) => {
            let total = n.as_u64()?;
            Some(StatEstimate {
                label: format_compact(total),
                total: Some(total),
            })
        }
        Value::String(s) => {
            let label = s.trim();
            if label.is_empty() {
                return None;
            }
            Some(StatEstimate {
                label: label.to_string(),
                total: parse_compact(label),
            })
        }
        Value::Object(obj) => {
            let total = TOTAL_FIELDS.iter().find_map(|f| {
                let v = obj.get(*f)?;
                v.as_u64().or_else(|| parse_compact(v.as_str()?))
            });
            let label = LABEL_FIELDS
                .iter()
                .find_map(|f| obj.get(*f)?.as_str())
                .map(str::to_string);

            match (label, total) {
                (Some(label), total) => Some(StatEstimate { label, total }),
                (None, Some(total)) => Some(StatEstimate {
                    label: format_compact(total),
                    total: Some(total),
                }),
                (None, None) => None,
            }
        }
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verdict_empty_object_is_valid() {
        assert!(key_check_verdict(&json!({})));
    }

    #[test]
    fn test_verdict_explicit_false_is_invalid() {
        assert!(!key_check_verdict(&json!({"valid": false})));
        assert!(!key_check_verdict(&json!({"status": false, "valid": false})));
    }

    #[test]
    fn test_verdict_error_field_is_invalid() {
        assert!(!key_check_verdict(&json!({"error": "bad key"})));
        // An error field rejects even next to an ok signal
        assert!(!key_check_verdict(&json!({"error": "expired", "status": true})));
    }

    #[test]
    fn test_verdict_any_true_signal_is_valid() {
        assert!(key_check_verdict(&json!({"status": true})));
        assert!(key_check_verdict(&json!({"status": false, "valid": true})));
        assert!(key_check_verdict(&json!({"success": true})));
    }

    #[test]
    fn test_verdict_unknown_fields_only_is_valid() {
        assert!(key_check_verdict(&json!({"account": {"name": "x"}, "tier": 2})));
    }

    #[test]
    fn test_verdict_non_object_is_invalid() {
        assert!(!key_check_verdict(&json!("ok")));
        assert!(!key_check_verdict(&json!(null)));
        assert!(!key_check_verdict(&json!([1, 2])));
    }

    #[test]
    fn test_normalize_bare_number() {
        let est = normalize_estimate(&json!(2_500_000)).unwrap();
        assert_eq!(est.label, "2.5m");
        assert_eq!(est.total, Some(2_500_000));
    }

    #[test]
    fn test_normalize_bare_string() {
        let est = normalize_estimate(&json!("1.2b")).unwrap();
        assert_eq!(est.label, "1.2b");
        assert_eq!(est.total, Some(1_200_000_000));
    }

    #[test]
    fn test_normalize_object_total_field() {
        let est = normalize_estimate(&json!({"total": 850_000})).unwrap();
        assert_eq!(est.total, Some(850_000));
        assert_eq!(est.label, "850k");
    }

    #[test]
    fn test_normalize_object_label_priority() {
        let est = normalize_estimate(&json!({
            "estimate": "3.1m",
            "total": 3_100_000
        }))
        .unwrap();
        assert_eq!(est.label, "3.1m");
        assert_eq!(est.total, Some(3_100_000));
    }

    #[test]
    fn test_normalize_unusable_entries() {
        assert_eq!(normalize_estimate(&json!(null)), None);
        assert_eq!(normalize_estimate(&json!({})), None);
        assert_eq!(normalize_estimate(&json!("")), None);
        assert_eq!(normalize_estimate(&json!(true)), None);
    }

    #[test]
    fn test_normalize_unparseable_label_keeps_text() {
        let est = normalize_estimate(&json!("N/A")).unwrap();
        assert_eq!(est.label, "N/A");
        assert_eq!(est.total, None);
    }
}
