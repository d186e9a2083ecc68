//! engine::events
//!
//! Per-ref notifications emitted after each apply.
//!
//! Delivery is best-effort. The orchestrator logs a failed publish and
//! carries on with the remaining refs.

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::outcome::RefUpdateResult;
use crate::core::types::{RefName, RepositoryId};

/// Source reported when a request carries no label.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Errors from publishing an event.
#[derive(Debug, Error)]
pub enum EventError {
    /// The receiving side is gone.
    #[error("event channel disconnected")]
    Disconnected,

    /// The sink refused the event.
    #[error("event rejected: {0}")]
    Rejected(String),
}

/// Whether a ref reached its requested value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicationStatus {
    Succeeded,
    Failed,
}

impl From<RefUpdateResult> for ReplicationStatus {
    fn from(result: RefUpdateResult) -> Self {
        if result.is_success() {
            ReplicationStatus::Succeeded
        } else {
            ReplicationStatus::Failed
        }
    }
}

/// Outcome of one ref in an applied batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefReplicatedEvent {
    pub repository: RepositoryId,
    pub ref_name: RefName,
    pub source: String,
    pub status: ReplicationStatus,
    pub result: RefUpdateResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_created_on: Option<DateTime<Utc>>,
}

/// Receiver of replication events.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &RefReplicatedEvent) -> Result<(), EventError>;
}

/// Writes each event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn publish(&self, event: &RefReplicatedEvent) -> Result<(), EventError> {
        info!(
            repository = %event.repository,
            ref_name = %event.ref_name,
            source = %event.source,
            status = ?event.status,
            result = %event.result,
            "ref replicated"
        );
        Ok(())
    }
}

/// Forwards events over a crossbeam channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<RefReplicatedEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<RefReplicatedEvent>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end of an unbounded channel.
    pub fn unbounded() -> (Self, crossbeam_channel::Receiver<RefReplicatedEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: &RefReplicatedEvent) -> Result<(), EventError> {
        self.tx
            .send(event.clone())
            .map_err(|_| EventError::Disconnected)
    }
}
