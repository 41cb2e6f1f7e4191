//! # Customer Records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::order::Address;
use crate::types::RecordSyncStatus;

/// A customer ready to be written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCustomer {
    /// Positive ERP customer id.
    pub id: i64,
    /// Lower-cased; `None` when the ERP has no address on file.
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    /// NIF / CIF.
    pub tax_id: String,
    pub phone: String,
    pub billing: Address,
    pub shipping: Address,
    pub created_at: Option<DateTime<Utc>>,
    pub external_id: String,
    pub sync_status: RecordSyncStatus,
}

impl NormalizedCustomer {
    /// `"first last"`, or the company when both names are blank.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.company.clone()
        } else {
            full.to_string()
        }
    }
}
