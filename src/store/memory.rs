//! In-memory customer store for dev mode and tests. Mirrors the Stripe
//! metadata semantics, including empty-string deletes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use super::{CustomerRecord, CustomerStore, MetadataMap};
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct MemoryCustomerStore {
    // Keyed by customer id
    records: Arc<Mutex<HashMap<String, CustomerRecord>>>,
}

impl MemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CustomerRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of customer records held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn apply_metadata(target: &mut MetadataMap, updates: MetadataMap) {
    for (key, value) in updates {
        if value.is_empty() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}

#[async_trait]
impl CustomerStore for MemoryCustomerStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<CustomerRecord>> {
        let records = self.lock();
        Ok(records.values().find(|r| r.email == email).cloned())
    }

    async fn create(&self, email: &str, metadata: MetadataMap) -> Result<CustomerRecord> {
        let mut cleaned = MetadataMap::new();
        apply_metadata(&mut cleaned, metadata);

        let record = CustomerRecord {
            id: format!("cus_{}", Uuid::new_v4().simple()),
            email: email.to_string(),
            metadata: cleaned,
        };

        self.lock().insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, metadata: MetadataMap) -> Result<CustomerRecord> {
        let mut records = self.lock();
        let record = records
            .get_mut(id)
            .ok_or_else(|| crate::error::AppError::NotFound("Customer not found".into()))?;

        apply_metadata(&mut record.metadata, metadata);
        Ok(record.clone())
    }
}
