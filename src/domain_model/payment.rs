use crate::domain_model::Scope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

/// A donation the client already knows about, e.g. one it completed itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub payment_id: String,
    pub scope: Scope,
    pub status: PaymentStatus,
    /// Minor currency units.
    pub amount: u64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn is_succeeded(&self) -> bool {
        self.status == PaymentStatus::Succeeded
    }
}
