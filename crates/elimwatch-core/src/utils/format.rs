/// Format a number of seconds as a compact countdown like "1h 4m 10s".
/// Zero-valued leading units are dropped; the caller handles sign.
pub fn format_hms(total_secs: u64) -> String {
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;

    if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// Render a large number with a k/m/b suffix: 2_500_000 -> "2.5m".
/// One decimal place, trailing ".0" trimmed.
pub fn format_compact(n: u64) -> String {
    const UNITS: [(u64, &str); 3] = [(1_000_000_000, "b"), (1_000_000, "m"), (1_000, "k")];

    for (scale, suffix) in UNITS {
        if n >= scale {
            let value = n as f64 / scale as f64;
            let rendered = format!("{:.1}", value);
            let rendered = rendered.trim_end_matches(".0");
            return format!("{}{}", rendered, suffix);
        }
    }
    n.to_string()
}

/// Parse a compact number like "2.5m", "125k" or "1,234,567" back to a value.
/// Suffixes are case-insensitive. Returns None for anything unrecognized.
pub fn parse_compact(s: &str) -> Option<u64> {
    let cleaned: String = s.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }

    let lower = cleaned.to_lowercase();
    let (mantissa, scale) = match lower.strip_suffix(['k', 'm', 'b']) {
        Some(m) => {
            let scale = match lower.as_bytes()[lower.len() - 1] {
                b'k' => 1_000_f64,
                b'm' => 1_000_000_f64,
                _ => 1_000_000_000_f64,
            };
            (m, scale)
        }
        None => (lower.as_str(), 1_f64),
    };

    let value: f64 = mantissa.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * scale).round() as u64)
}
