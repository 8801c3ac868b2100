use crate::domain_model::PaymentRecord;

/// Payment records the client already holds locally.
pub trait PaymentRecordSource: Send + Sync {
    fn known_payments(&self) -> Vec<PaymentRecord>;
}
