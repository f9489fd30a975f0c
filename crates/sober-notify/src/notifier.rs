//! Notification sinks

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::{NotifyError, NotifyResult, OwnerAlert};

/// Delivers an owner alert. Called off the control loop; may block.
pub trait Notifier: Send + Sync {
    fn send(&self, alert: &OwnerAlert) -> NotifyResult<()>;
}

/// Emits the alert as a structured log event
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, alert: &OwnerAlert) -> NotifyResult<()> {
        warn!(
            subject = %alert.subject,
            raised_at = %alert.raised_at,
            blocked_until = %alert.blocked_until,
            alcohol_level = ?alert.alcohol_level,
            city = ?alert.location.city,
            country = ?alert.location.country,
            latitude = ?alert.location.latitude,
            longitude = ?alert.location.longitude,
            "Owner alert"
        );
        Ok(())
    }
}

/// Drops each alert as `alert-<micros>.json` into a directory that an
/// external mailer watches. Files appear atomically.
#[derive(Clone, Debug)]
pub struct OutboxNotifier {
    dir: PathBuf,
}

impl OutboxNotifier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        OutboxNotifier { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Notifier for OutboxNotifier {
    fn send(&self, alert: &OwnerAlert) -> NotifyResult<()> {
        fs::create_dir_all(&self.dir)?;

        let name = format!("alert-{}.json", alert.raised_at.as_micros());
        let target = self.dir.join(&name);
        let partial = self.dir.join(format!(".{name}.part"));

        #[derive(serde::Serialize)]
        struct OutboxMessage<'a> {
            #[serde(flatten)]
            alert: &'a OwnerAlert,
            body: String,
        }

        let message = OutboxMessage {
            alert,
            body: alert.body(),
        };
        let json = serde_json::to_vec_pretty(&message)
            .map_err(|e| NotifyError::Serialization(e.to_string()))?;

        {
            let mut file = File::create(&partial)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&partial, &target)?;
        Ok(())
    }
}
