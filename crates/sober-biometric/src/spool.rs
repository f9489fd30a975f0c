//! Spool-directory camera
//!
//! The camera device and face detector run in an external capture helper.
//! The interlock and the helper share a directory:
//!
//! 1. `capture` writes `request.json` (`purpose`, `requested_at`)
//! 2. the helper captures, detects faces and drops `<anything>.json` frame
//!    files shaped like `{"captured_at": "<rfc3339>", "faces": [[f64; 128], ...]}`
//! 3. `capture` consumes the first frame captured at or after the request and
//!    deletes the request
//!
//! Frames captured before the request are stale and are deleted unread, so an
//! old face can never answer a new question.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sober_core::{CaptureError, FaceEncoding, Timestamp};

use crate::{Camera, CapturePurpose, CapturedFrame};

pub const REQUEST_FILE: &str = "request.json";

#[derive(Debug, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub purpose: String,
    pub requested_at: Timestamp,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpoolFrame {
    pub captured_at: Timestamp,
    #[serde(default)]
    pub faces: Vec<FaceEncoding>,
}

pub struct SpoolCamera {
    dir: PathBuf,
    poll_interval: Duration,
}

impl SpoolCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SpoolCamera {
            dir: dir.into(),
            poll_interval: Duration::from_millis(50),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_request(&self, purpose: CapturePurpose, requested_at: Timestamp) -> Result<(), CaptureError> {
        fs::create_dir_all(&self.dir).map_err(device_error)?;
        let request = CaptureRequest {
            purpose: purpose.as_str().to_string(),
            requested_at,
        };
        let body = serde_json::to_vec(&request).map_err(|e| CaptureError::Device(e.to_string()))?;

        let tmp = self.dir.join(format!("{REQUEST_FILE}.tmp"));
        let mut file = fs::File::create(&tmp).map_err(device_error)?;
        file.write_all(&body).map_err(device_error)?;
        file.sync_all().map_err(device_error)?;
        fs::rename(&tmp, self.dir.join(REQUEST_FILE)).map_err(device_error)
    }

    fn clear_request(&self) {
        let path = self.dir.join(REQUEST_FILE);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove capture request");
            }
        }
    }

    /// Frame files in name order, excluding the request itself
    fn frame_files(&self) -> Result<Vec<PathBuf>, CaptureError> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)
            .map_err(device_error)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "json")
                    && path.file_name().is_some_and(|name| name != REQUEST_FILE)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Take the first fresh frame, deleting stale or unreadable ones on the way
    fn take_fresh_frame(&self, requested_at: Timestamp) -> Result<Option<CapturedFrame>, CaptureError> {
        for path in self.frame_files()? {
            let parsed = fs::read(&path)
                .map_err(|e| e.to_string())
                .and_then(|bytes| serde_json::from_slice::<SpoolFrame>(&bytes).map_err(|e| e.to_string()));

            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove spool frame");
            }

            match parsed {
                Ok(frame) if frame.captured_at >= requested_at => {
                    return Ok(Some(CapturedFrame::new(frame.captured_at, frame.faces)));
                }
                Ok(frame) => {
                    debug!(path = %path.display(), captured_at = %frame.captured_at, "Discarding stale frame");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Discarding unreadable frame");
                }
            }
        }
        Ok(None)
    }
}

impl Camera for SpoolCamera {
    fn capture(
        &mut self,
        purpose: CapturePurpose,
        timeout: Duration,
    ) -> Result<CapturedFrame, CaptureError> {
        let started = Instant::now();
        let requested_at = Timestamp::from_system_time(SystemTime::now());
        self.write_request(purpose, requested_at)?;
        debug!(%purpose, dir = %self.dir.display(), "Capture requested");

        let result = loop {
            match self.take_fresh_frame(requested_at) {
                Ok(Some(frame)) => break Ok(frame),
                Ok(None) => {}
                Err(e) => break Err(e),
            }
            if started.elapsed() >= timeout {
                break Err(CaptureError::Timeout(timeout));
            }
            thread::sleep(self.poll_interval);
        };

        self.clear_request();
        result
    }
}

fn device_error(e: std::io::Error) -> CaptureError {
    CaptureError::Device(e.to_string())
}
