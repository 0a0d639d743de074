//! Exchange activity log
//!
//! One JSON object per line for every acquire, release and registration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::member::Amount;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEventType {
    /// Connections acquired for a member
    Acquire,
    /// Member's connections released
    Release,
    /// Member registered or refreshed its credential
    Register,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: ActivityEventType,
    /// Process that ran the workflow
    pub host_id: String,
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<u32>,
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ActivityEvent {
    pub fn new(event_type: ActivityEventType, host_id: String, identity: String) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            host_id,
            identity,
            amount: None,
            granted: None,
            released: None,
            failed: None,
            duration_ms: None,
            metadata: None,
        }
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_granted(mut self, granted: u32) -> Self {
        self.granted = Some(granted);
        self
    }

    pub fn with_release(mut self, released: u32, failed: u32) -> Self {
        self.released = Some(released);
        self.failed = Some(failed);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Writes activity events to a JSONL file; a no-op until a file is attached
#[derive(Clone)]
pub struct ActivityLogger {
    inner: Arc<Mutex<Option<BufWriter<File>>>>,
    host_id: String,
}

impl ActivityLogger {
    pub fn new(host_id: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
            host_id,
        }
    }

    /// Open `path` for appending, creating it if needed
    pub async fn init_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        *self.inner.lock().await = Some(BufWriter::new(file));

        info!("Activity logging initialized to {}", path.display());
        Ok(())
    }

    pub async fn log(&self, event: ActivityEvent) {
        let line = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize activity event: {}", e);
                return;
            }
        };

        let mut inner = self.inner.lock().await;
        if let Some(writer) = inner.as_mut() {
            if let Err(e) = writeln!(writer, "{}", line) {
                error!("Failed to write activity event: {}", e);
            }
            if let Err(e) = writer.flush() {
                error!("Failed to flush activity log: {}", e);
            }
        }
    }

    pub async fn log_acquire(&self, identity: &str, amount: Amount, granted: u32, duration_ms: u64) {
        let event = ActivityEvent::new(ActivityEventType::Acquire, self.host_id.clone(), identity.to_string())
            .with_amount(amount)
            .with_granted(granted)
            .with_duration(duration_ms);
        self.log(event).await;
    }

    pub async fn log_release(&self, identity: &str, released: u32, failed: u32, duration_ms: u64) {
        let event = ActivityEvent::new(ActivityEventType::Release, self.host_id.clone(), identity.to_string())
            .with_release(released, failed)
            .with_duration(duration_ms);
        self.log(event).await;
    }

    pub async fn log_register(&self, identity: &str, created: bool, referred_by: Option<&str>) {
        let event = ActivityEvent::new(ActivityEventType::Register, self.host_id.clone(), identity.to_string())
            .with_metadata(serde_json::json!({
                "created": created,
                "referred_by": referred_by,
            }));
        self.log(event).await;
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }
}
