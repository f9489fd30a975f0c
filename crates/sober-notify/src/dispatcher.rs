//! Fire-and-forget alert dispatch

use std::sync::Arc;

use sober_core::BlockAlert;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{Location, LocationProvider, Notifier, OwnerAlert};

/// Runs location lookup and delivery on the blocking pool.
///
/// The control loop calls [`dispatch`](Self::dispatch) and moves on; the
/// returned handle exists for tests and shutdown, not for the loop to await.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    locator: Arc<dyn LocationProvider>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, locator: Arc<dyn LocationProvider>) -> Self {
        NotificationDispatcher { notifier, locator }
    }

    /// Must be called from within a tokio runtime
    pub fn dispatch(&self, alert: BlockAlert) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        let locator = Arc::clone(&self.locator);
        tokio::task::spawn_blocking(move || deliver(notifier.as_ref(), locator.as_ref(), &alert))
    }
}

/// Look up the location, build the alert and send it. Never fails.
pub fn deliver(notifier: &dyn Notifier, locator: &dyn LocationProvider, alert: &BlockAlert) {
    let location = locator.locate().unwrap_or_else(|e| {
        warn!(error = %e, "Location lookup failed; reporting unknown location");
        Location::unknown()
    });

    let owner_alert = OwnerAlert::new(alert, location);
    match notifier.send(&owner_alert) {
        Ok(()) => info!(blocked_until = %alert.blocked_until, "Owner alert sent"),
        Err(e) => warn!(error = %e, "Owner alert not delivered"),
    }
}
