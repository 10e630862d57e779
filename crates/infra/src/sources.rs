//! File-backed feeds for the external collaborators.
//!
//! Prescriptions and test prices belong to other parts of the clinic application. A
//! standalone deployment can export them as JSON and point `[sources]` at the files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use clinicrx_core::Money;
use clinicrx_orders::{InMemoryPrescriptionSource, InMemoryTestCatalog, Prescription};

use crate::persistence::PersistenceError;

/// Load a JSON array of prescriptions.
pub fn load_prescriptions(path: &Path) -> Result<InMemoryPrescriptionSource, PersistenceError> {
    let bytes = fs::read(path)?;
    let prescriptions: Vec<Prescription> = serde_json::from_slice(&bytes)?;
    tracing::info!(path = %path.display(), count = prescriptions.len(), "prescriptions loaded");
    Ok(InMemoryPrescriptionSource::from_prescriptions(prescriptions))
}

/// Load a JSON object mapping test name to price (`{"CBC": "350.00"}`).
pub fn load_test_catalog(path: &Path) -> Result<InMemoryTestCatalog, PersistenceError> {
    let bytes = fs::read(path)?;
    let entries: BTreeMap<String, Money> = serde_json::from_slice(&bytes)?;
    if let Some((name, price)) = entries.iter().find(|(_, price)| price.is_sign_negative()) {
        return Err(PersistenceError::Corrupt(format!(
            "test catalog price for '{name}' is negative ({price})"
        )));
    }
    tracing::info!(path = %path.display(), count = entries.len(), "test catalog loaded");
    Ok(InMemoryTestCatalog::from_entries(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinicrx_orders::{DiagnosticTestCatalog, PrescriptionId, PrescriptionSource};
    use rust_decimal_macros::dec;

    #[test]
    fn catalog_accepts_string_and_number_prices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(&path, r#"{"Complete Blood Count": "350.00", "Lipid Profile": 800}"#).unwrap();

        let catalog = load_test_catalog(&path).unwrap();
        assert_eq!(catalog.price_of("complete blood count"), Some(dec!(350)));
        assert_eq!(catalog.price_of("LIPID PROFILE"), Some(dec!(800)));
    }

    #[test]
    fn negative_catalog_price_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(&path, r#"{"CBC": "-1"}"#).unwrap();

        assert!(matches!(load_test_catalog(&path), Err(PersistenceError::Corrupt(_))));
    }

    #[test]
    fn prescriptions_load_with_optional_lists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rx.json");
        fs::write(
            &path,
            r#"[{"id": "RX-7", "patient_name": "Asha Rao",
                 "medications": [{"name": "Tab. Paracetamol 500mg", "quantity": 30}]}]"#,
        )
        .unwrap();

        let source = load_prescriptions(&path).unwrap();
        let rx = source.prescription(&PrescriptionId::new("RX-7").unwrap()).unwrap();
        assert_eq!(rx.medications[0].quantity, 30);
        assert!(rx.lab_tests.is_empty());
    }
}
