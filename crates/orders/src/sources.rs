//! External collaborators consumed while building orders.
//!
//! Prescriptions and diagnostic-test prices are owned by other parts of the clinic
//! application; this crate only reads them through these traits.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use clinicrx_core::{DomainError, DomainResult, Money};
use clinicrx_inventory::normalize;

/// Identifier of a prescription in the clinic's records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrescriptionId(String);

impl PrescriptionId {
    pub fn new(value: &str) -> DomainResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(DomainError::invalid_id("PrescriptionId: empty"));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PrescriptionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescribedMedication {
    /// Free text as written by the doctor.
    pub name: String,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: PrescriptionId,
    pub patient_name: String,
    #[serde(default)]
    pub medications: Vec<PrescribedMedication>,
    #[serde(default)]
    pub lab_tests: Vec<String>,
}

/// Read-only access to prescriptions.
pub trait PrescriptionSource: Send + Sync {
    fn prescription(&self, id: &PrescriptionId) -> Option<Prescription>;
}

/// Name → price lookup for diagnostic tests.
pub trait DiagnosticTestCatalog: Send + Sync {
    fn price_of(&self, test_name: &str) -> Option<Money>;
}

impl<S> PrescriptionSource for Arc<S>
where
    S: PrescriptionSource + ?Sized,
{
    fn prescription(&self, id: &PrescriptionId) -> Option<Prescription> {
        (**self).prescription(id)
    }
}

impl<C> DiagnosticTestCatalog for Arc<C>
where
    C: DiagnosticTestCatalog + ?Sized,
{
    fn price_of(&self, test_name: &str) -> Option<Money> {
        (**self).price_of(test_name)
    }
}

/// In-memory prescription source for dev/tests.
#[derive(Debug, Default)]
pub struct InMemoryPrescriptionSource {
    inner: RwLock<HashMap<PrescriptionId, Prescription>>,
}

impl InMemoryPrescriptionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_prescriptions(prescriptions: impl IntoIterator<Item = Prescription>) -> Self {
        let source = Self::new();
        for p in prescriptions {
            source.insert(p);
        }
        source
    }

    pub fn insert(&self, prescription: Prescription) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(prescription.id.clone(), prescription);
    }
}

impl PrescriptionSource for InMemoryPrescriptionSource {
    fn prescription(&self, id: &PrescriptionId) -> Option<Prescription> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

/// In-memory test catalog; lookups ignore case and extra whitespace.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTestCatalog {
    prices: HashMap<String, Money>,
}

impl InMemoryTestCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test(mut self, name: &str, price: Money) -> Self {
        self.prices.insert(normalize(name), price);
        self
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, Money)>) -> Self {
        entries
            .into_iter()
            .fold(Self::new(), |catalog, (name, price)| catalog.with_test(&name, price))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl DiagnosticTestCatalog for InMemoryTestCatalog {
    fn price_of(&self, test_name: &str) -> Option<Money> {
        self.prices.get(&normalize(test_name)).copied()
    }
}
