use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::coordinator::{Coordinator, RefreshEvent, RefreshOutcome};

/// Seconds between scheduler passes. A pass only asks the coordinator for
/// what is due; its staleness policy and attempt floor keep passes cheap.
const TICK_SECS: u64 = 1;

/// Drives the coordinator on a fixed tick while running.
///
/// One pass refreshes metadata plus the selected team's roster, non-forced,
/// so the coordinator decides what actually fetches. Settled outcomes go to
/// the event channel handed to `start`. Start and stop are explicit; `stop`
/// waits for the task to wind down so callers can observe that polling has
/// ended.
pub struct RefreshScheduler {
    coordinator: Coordinator,
    running: Mutex<Option<SchedulerHandle>>,
}

struct SchedulerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshScheduler {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator,
            running: Mutex::new(None),
        }
    }

    /// Start the polling task. Starting while already running is a no-op.
    pub fn start(&self, events: mpsc::UnboundedSender<RefreshEvent>) {
        let mut running = self.running.lock().unwrap();
        if running.is_some() {
            return;
        }

        let (stop, mut stopped) = watch::channel(false);
        let coordinator = self.coordinator.clone();
        let task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(TICK_SECS));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            debug!("Refresh scheduler started");
            loop {
                tokio::select! {
                    _ = tick.tick() => run_pass(&coordinator, &events).await,
                    _ = stopped.changed() => {
                        if *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Refresh scheduler stopped");
        });

        *running = Some(SchedulerHandle { stop, task });
    }

    /// Stop the polling task and wait for it to finish. Stopping while not
    /// running is a no-op.
    pub async fn stop(&self) {
        let handle = self.running.lock().unwrap().take();
        let Some(handle) = handle else { return };

        let _ = handle.stop.send(true);
        if let Err(e) = handle.task.await {
            warn!(error = %e, "Refresh scheduler task ended abnormally");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().unwrap().is_some()
    }
}

/// One scheduler pass: metadata always, plus the selected roster when a
/// team is selected. The two run concurrently so a slow one cannot starve
/// the other.
async fn run_pass(coordinator: &Coordinator, events: &mpsc::UnboundedSender<RefreshEvent>) {
    match coordinator.selected_team() {
        Some(team_id) => {
            let (meta, roster) = tokio::join!(
                coordinator.ensure_metadata_fresh(false),
                coordinator.ensure_team_fresh(team_id, false)
            );
            forward(events, RefreshEvent::Metadata(meta));
            forward(events, RefreshEvent::Roster(team_id, roster));
        }
        None => {
            let meta = coordinator.ensure_metadata_fresh(false).await;
            forward(events, RefreshEvent::Metadata(meta));
        }
    }
}

/// Routine `Fresh` and `Throttled` results stay out of the channel; the UI
/// only needs to hear when data changed or a session failed.
fn forward(events: &mpsc::UnboundedSender<RefreshEvent>, event: RefreshEvent) {
    match event.outcome() {
        RefreshOutcome::Fresh | RefreshOutcome::Throttled => return,
        RefreshOutcome::Failed(e) => warn!(error = %e, "Scheduled refresh failed"),
        _ => debug!(?event, "Scheduled refresh settled"),
    }
    // A closed channel means the front end is gone and nothing is listening.
    let _ = events.send(event);
}

// ============================================================================
// Tests
// ============================================================================
