//! Network-free approximation of partnership status.
//!
//! Answers from the payments this client already knows about. This trades
//! consistency for availability: a donation made on another device is not
//! visible here, so a `false` may be wrong while the backend is unreachable.

use crate::domain_model::{PaymentRecord, Scope};

/// True iff a succeeded payment targets the same passage as `scope`.
pub fn evaluate(scope: &Scope, records: &[PaymentRecord]) -> bool {
    records
        .iter()
        .any(|record| record.is_succeeded() && record.scope.same_passage(scope))
}
