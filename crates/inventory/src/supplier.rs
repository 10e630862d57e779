use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clinicrx_core::{DomainError, DomainResult, Entity, SupplierId};

/// A supplier referenced by stock receipts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    id: SupplierId,
    name: String,
    registered_at: DateTime<Utc>,
}

impl Supplier {
    pub fn register(id: SupplierId, name: &str, registered_at: DateTime<Utc>) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("supplier name cannot be empty"));
        }
        Ok(Self {
            id,
            name: name.to_string(),
            registered_at,
        })
    }

    pub fn id_typed(&self) -> SupplierId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }
}

impl Entity for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
