//! Background maintenance loops spawned at startup.

use std::time::Duration;

use applyflow_core::ApplicationTracker;

use crate::state::AppState;

/// Logs one reminder per stale application. Returns how many were sent.
pub fn send_stale_reminders(tracker: &ApplicationTracker, stale_days: u32) -> usize {
    let stale = tracker.stale_applications(stale_days);
    tracing::info!("Found {} stale applications", stale.len());

    for app in &stale {
        tracing::info!(
            to = %app.owner,
            company = %app.company_name,
            position = %app.position,
            stale_days,
            "sending stale application reminder"
        );
    }
    stale.len()
}

pub fn spawn_maintenance(state: &AppState) {
    let limiter = state.limiter.clone();
    let sweep_every = Duration::from_secs(state.config.rate_limit.sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            limiter.sweep_expired();
        }
    });

    let reminder = state.config.reminder.clone();
    if !reminder.enabled {
        tracing::debug!("Reminder scheduler is disabled");
        return;
    }

    let tracker = state.tracker.clone();
    let every = Duration::from_secs(reminder.interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            tracing::info!("Running stale application reminder check");
            send_stale_reminders(&tracker, reminder.stale_days);
        }
    });
}
