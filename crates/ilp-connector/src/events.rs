//! Outcomes published to collaborators outside the connector core.

use chrono::{DateTime, Utc};
use ilp_ledger::AccountId;
use ilp_packet::ErrorCode;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::error;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Fulfilled,
    Rejected,
    Expired,
}

/// Emitted once for every packet that reached a terminal state.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SettlementEvent {
    pub packet_id: Uuid,
    pub source_account_id: Option<AccountId>,
    pub destination_account_id: Option<AccountId>,
    pub outcome: Outcome,
    /// In the source account's scale
    pub source_amount: u64,
    /// In the destination account's scale; zero if no route was found
    pub destination_amount: u64,
    /// Reject code for rejected and expired packets
    pub code: Option<ErrorCode>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// One leg of a transfer was posted and the other was not
    PartialSettlement,
    /// The ledger storage failed while a packet was in flight
    StorageFailure,
}

/// A ledger inconsistency or failure that needs manual reconciliation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OperatorAlert {
    pub kind: AlertKind,
    pub packet_id: Uuid,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Broadcast channels for settlement events and operator alerts.
///
/// Slow subscribers lag and miss events instead of slowing packets down.
#[derive(Clone)]
pub struct EventBus {
    settlements: broadcast::Sender<SettlementEvent>,
    alerts: broadcast::Sender<OperatorAlert>,
}

impl EventBus {
    pub fn new(buffer: usize) -> Self {
        let (settlements, _) = broadcast::channel(buffer.max(1));
        let (alerts, _) = broadcast::channel(buffer.max(1));
        EventBus {
            settlements,
            alerts,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettlementEvent> {
        self.settlements.subscribe()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<OperatorAlert> {
        self.alerts.subscribe()
    }

    pub fn publish(&self, event: SettlementEvent) {
        // Sending only fails when nobody is subscribed
        let _ = self.settlements.send(event);
    }

    pub fn alert(&self, kind: AlertKind, packet_id: Uuid, message: String) {
        error!(
            target: "ilp_connector::alert",
            packet_id = %packet_id,
            "{:?}: {}",
            kind,
            message
        );
        let _ = self.alerts.send(OperatorAlert {
            kind,
            packet_id,
            message,
            timestamp: Utc::now(),
        });
    }
}
