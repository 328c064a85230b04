//! Payment transactions and their per-transaction lifecycle.
//!
//! ```text
//! (new) ──► Purchasing ──► Purchased | Restored   (terminal, acknowledge)
//!   │           │     └──► Failed                 (terminal, acknowledge)
//!   │           └────────► Deferred ──► Purchased | Restored | Failed
//!   └── any state may be the first one observed (restorations start at Restored)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use entitlekit_core::{Aggregate, AggregateRoot, DomainError, ProductId, TransactionId};
use entitlekit_events::Event;

use crate::status::TransactionStatus;

/// Lifecycle state reported by the purchase backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Purchasing,
    Purchased,
    /// Re-surfaced by a restoration; equivalent to `Purchased`.
    Restored,
    Failed,
    /// Waiting for external approval.
    Deferred,
}

impl TransactionState {
    /// Terminal states must be acknowledged with the backend exactly once.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Purchased | TransactionState::Restored | TransactionState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Purchasing => "purchasing",
            TransactionState::Purchased => "purchased",
            TransactionState::Restored => "restored",
            TransactionState::Failed => "failed",
            TransactionState::Deferred => "deferred",
        }
    }

    fn may_follow(&self, previous: TransactionState) -> bool {
        match previous {
            TransactionState::Purchasing => true,
            TransactionState::Deferred => !matches!(self, TransactionState::Purchasing),
            TransactionState::Purchased | TransactionState::Restored | TransactionState::Failed => {
                false
            }
        }
    }
}

/// A transaction as delivered by the backend's payment queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: TransactionId,
    pub product_id: ProductId,
    pub state: TransactionState,
    /// Backend-provided failure description for `Failed` transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentTransaction {
    pub fn new(
        id: impl Into<TransactionId>,
        product_id: impl Into<ProductId>,
        state: TransactionState,
    ) -> Self {
        Self {
            id: id.into(),
            product_id: product_id.into(),
            state,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Lifecycle update carried by this delivery.
    pub fn update(&self, observed_at: DateTime<Utc>) -> TransactionUpdate {
        TransactionUpdate {
            state: self.state,
            error: self.error.clone(),
            observed_at,
        }
    }
}

/// Command: the backend reported a new state for a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionUpdate {
    pub state: TransactionState,
    pub error: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// Event: a state transition that was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub transaction_id: TransactionId,
    pub product_id: ProductId,
    pub state: TransactionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl TransactionEvent {
    /// Status published to observers for this transition.
    pub fn status(&self) -> TransactionStatus {
        match self.state {
            TransactionState::Purchasing => TransactionStatus::Purchasing,
            TransactionState::Purchased | TransactionState::Restored => TransactionStatus::Purchased,
            TransactionState::Failed => TransactionStatus::Failed {
                reason: self.error.clone(),
            },
            TransactionState::Deferred => TransactionStatus::Deferred,
        }
    }

    pub fn requires_acknowledgment(&self) -> bool {
        self.state.is_terminal()
    }
}

impl Event for TransactionEvent {
    fn event_type(&self) -> &'static str {
        match self.state {
            TransactionState::Purchasing => "transaction.purchasing",
            TransactionState::Purchased => "transaction.purchased",
            TransactionState::Restored => "transaction.restored",
            TransactionState::Failed => "transaction.failed",
            TransactionState::Deferred => "transaction.deferred",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Aggregate: one transaction the processor has seen but not yet finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    id: TransactionId,
    product_id: ProductId,
    state: Option<TransactionState>,
    version: u64,
}

impl PendingTransaction {
    /// A transaction nothing has been observed for yet.
    pub fn empty(id: TransactionId, product_id: ProductId) -> Self {
        Self {
            id,
            product_id,
            state: None,
            version: 0,
        }
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn state(&self) -> Option<TransactionState> {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.state.is_some_and(|s| s.is_terminal())
    }
}

impl AggregateRoot for PendingTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for PendingTransaction {
    type Command = TransactionUpdate;
    type Event = TransactionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        self.state = Some(event.state);
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if let Some(previous) = self.state {
            if previous.is_terminal() {
                return Err(DomainError::conflict(format!(
                    "transaction {} already finalized as {}",
                    self.id,
                    previous.as_str()
                )));
            }
            if !command.state.may_follow(previous) {
                return Err(DomainError::invariant(format!(
                    "transaction {} cannot move from {} to {}",
                    self.id,
                    previous.as_str(),
                    command.state.as_str()
                )));
            }
        }

        Ok(vec![TransactionEvent {
            transaction_id: self.id.clone(),
            product_id: self.product_id.clone(),
            state: command.state,
            error: command.error.clone(),
            occurred_at: command.observed_at,
        }])
    }
}
