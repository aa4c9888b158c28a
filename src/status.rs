//! Status snapshots
//!
//! Every account loop owns its state and publishes immutable
//! [`StatusSnapshot`]s over one mpsc channel. A single display task consumes
//! the channel, keeps the latest snapshot per account and renders each change
//! as a status line through `tracing` (target `status`).

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::types::ActionKind;

/// Channel capacity between the loops and the display task
pub const STATUS_CHANNEL_CAPACITY: usize = 256;

/// Today's progress of one action kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaStatus {
    pub kind: ActionKind,
    pub today: u32,
    pub limit: u32,
    pub enabled: bool,
}

impl QuotaStatus {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.today)
    }
}

/// Immutable view of one account at a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub index: usize,
    pub address: Address,
    pub native_balance: U256,
    pub wrapped_balance: Option<U256>,
    pub quotas: Vec<QuotaStatus>,
    pub message: String,
    pub remaining_delay: Option<Duration>,
    pub restarts: u32,
}

/// Messages consumed by the display task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Account(StatusSnapshot),
    /// Account-independent progress line
    Info(String),
}

/// Sending half handed to every account loop
#[derive(Debug, Clone)]
pub struct StatusReporter {
    tx: mpsc::Sender<StatusEvent>,
}

impl StatusReporter {
    pub fn new(tx: mpsc::Sender<StatusEvent>) -> Self {
        Self { tx }
    }

    /// Reporter plus the receiver for [`run_display`]
    pub fn channel() -> (Self, mpsc::Receiver<StatusEvent>) {
        let (tx, rx) = mpsc::channel(STATUS_CHANNEL_CAPACITY);
        (Self::new(tx), rx)
    }

    pub async fn publish(&self, snapshot: StatusSnapshot) {
        self.send(StatusEvent::Account(snapshot)).await;
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.send(StatusEvent::Info(message.into())).await;
    }

    async fn send(&self, event: StatusEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("Status display is gone, dropping event");
        }
    }
}

/// Render a duration as `H Hours M Minutes S Seconds`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{} Hours {} Minutes {} Seconds", hours, minutes, seconds)
}

/// One status line for a snapshot
pub fn render_line(snapshot: &StatusSnapshot, symbol: &str) -> String {
    let mut line = format!(
        "[{}] {:#x} | {} {}",
        snapshot.index + 1,
        snapshot.address,
        format_ether(snapshot.native_balance),
        symbol
    );
    if let Some(wrapped) = snapshot.wrapped_balance {
        line.push_str(&format!(" | W{} {}", symbol, format_ether(wrapped)));
    }
    for quota in snapshot.quotas.iter().filter(|q| q.enabled) {
        line.push_str(&format!(" | {} {}/{}", quota.kind, quota.today, quota.limit));
    }
    line.push_str(&format!(" | {}", snapshot.message));
    if let Some(delay) = snapshot.remaining_delay {
        line.push_str(&format!(" | next in {}", format_duration(delay)));
    }
    if snapshot.restarts > 0 {
        line.push_str(&format!(" | restarts {}", snapshot.restarts));
    }
    line
}

/// Latest snapshot per account
#[derive(Debug, Default)]
pub struct StatusBoard {
    accounts: BTreeMap<usize, StatusSnapshot>,
}

impl StatusBoard {
    /// Store a snapshot; returns false when nothing changed
    pub fn update(&mut self, snapshot: StatusSnapshot) -> bool {
        if self.accounts.get(&snapshot.index) == Some(&snapshot) {
            return false;
        }
        self.accounts.insert(snapshot.index, snapshot);
        true
    }

    pub fn get(&self, index: usize) -> Option<&StatusSnapshot> {
        self.accounts.get(&index)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Display task. Returns the final board once every reporter is dropped.
pub async fn run_display(mut rx: mpsc::Receiver<StatusEvent>, symbol: String) -> StatusBoard {
    let mut board = StatusBoard::default();
    while let Some(event) = rx.recv().await {
        match event {
            StatusEvent::Account(snapshot) => {
                let line = render_line(&snapshot, &symbol);
                if board.update(snapshot) {
                    info!(target: "status", "{}", line);
                }
            }
            StatusEvent::Info(message) => info!(target: "status", "{}", message),
        }
    }
    board
}
