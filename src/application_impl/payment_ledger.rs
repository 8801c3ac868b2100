use crate::domain_model::PaymentRecord;
use crate::domain_port::PaymentRecordSource;
use std::sync::{PoisonError, RwLock};

/// Payment records known to this client, newest last.
#[derive(Debug, Default)]
pub struct InMemoryPaymentLedger {
    records: RwLock<Vec<PaymentRecord>>,
}

impl InMemoryPaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<PaymentRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Insert a record, replacing an earlier one with the same payment id.
    pub fn record(&self, record: PaymentRecord) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.retain(|r| r.payment_id != record.payment_id);
        records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PaymentRecordSource for InMemoryPaymentLedger {
    fn known_payments(&self) -> Vec<PaymentRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
