use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use clinicrx_core::{BatchId, DomainError, DomainResult, Money};
use clinicrx_inventory::{AllocationPolicy, ItemMatcher, StockLedger};

use crate::order::{BillingDomain, LineKind, Order, OrderLine};
use crate::sources::{DiagnosticTestCatalog, Prescription};

/// A line typed in at the counter for a walk-in sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManualLine {
    Medicine { name: String, quantity: u64 },
    LabTest { name: String },
}

/// A consultation or lab service. Without a price the catalog is consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLine {
    pub name: String,
    #[serde(default)]
    pub unit_price: Option<Money>,
    #[serde(default = "one")]
    pub quantity: u64,
}

fn one() -> u64 {
    1
}

/// Composes draft orders from prescriptions, counter entries and service lists.
///
/// Medicine lines are resolved against the ledger through [`ItemMatcher`] and default to
/// the first batch with stock under the allocation policy. Lab tests are priced from the
/// [`DiagnosticTestCatalog`]. Nothing here touches stock.
pub struct OrderBuilder<'a> {
    ledger: &'a StockLedger,
    catalog: &'a dyn DiagnosticTestCatalog,
    policy: AllocationPolicy,
    today: NaiveDate,
}

impl<'a> OrderBuilder<'a> {
    pub fn new(ledger: &'a StockLedger, catalog: &'a dyn DiagnosticTestCatalog) -> Self {
        Self {
            ledger,
            catalog,
            policy: AllocationPolicy::default(),
            today: Utc::now().date_naive(),
        }
    }

    pub fn with_policy(mut self, policy: AllocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Date used to skip expired batches.
    pub fn on_date(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    fn matcher(&self) -> ItemMatcher<'a> {
        ItemMatcher::new(self.ledger).with_policy(self.policy)
    }

    pub fn from_prescription(&self, prescription: &Prescription) -> DomainResult<Order> {
        let domain = if prescription.medications.is_empty() {
            BillingDomain::Lab
        } else {
            BillingDomain::Pharmacy
        };
        let mut order = Order::new(domain, &prescription.patient_name, Some(prescription.id.clone()));

        for med in &prescription.medications {
            self.add_line(&mut order, &med.name, med.quantity)?;
        }
        for test in &prescription.lab_tests {
            self.add_lab_test(&mut order, test)?;
        }

        tracing::debug!(
            prescription = %prescription.id,
            domain = %domain,
            lines = order.lines().len(),
            unresolved = order.unresolved_lines().len(),
            "order built from prescription"
        );
        Ok(order)
    }

    pub fn from_manual_entry(&self, subject_name: &str, lines: &[ManualLine]) -> DomainResult<Order> {
        let has_medicine = lines.iter().any(|l| matches!(l, ManualLine::Medicine { .. }));
        let domain = if has_medicine || lines.is_empty() {
            BillingDomain::Pharmacy
        } else {
            BillingDomain::Lab
        };
        let mut order = Order::new(domain, subject_name, None);

        for line in lines {
            match line {
                ManualLine::Medicine { name, quantity } => {
                    self.add_line(&mut order, name, *quantity)?;
                }
                ManualLine::LabTest { name } => {
                    self.add_lab_test(&mut order, name)?;
                }
            }
        }
        Ok(order)
    }

    pub fn service_order(
        &self,
        domain: BillingDomain,
        subject_name: &str,
        services: &[ServiceLine],
    ) -> DomainResult<Order> {
        let mut order = Order::new(domain, subject_name, None);
        for service in services {
            let price = service
                .unit_price
                .or_else(|| self.catalog.price_of(&service.name));
            order.push(OrderLine::service(&service.name, price, service.quantity)?);
        }
        Ok(order)
    }

    /// Adds a medicine line; returns its index. The line is unresolved when no batch
    /// with stock matches `text`. Fails, leaving `order` as is, when the line amount is
    /// out of range.
    pub fn add_line(&self, order: &mut Order, text: &str, quantity: u64) -> DomainResult<usize> {
        let batch = self.matcher().first_available(text, self.today);
        if batch.is_none() {
            tracing::debug!(text, "medicine line left unresolved");
        }
        let line = OrderLine::medicine(text, batch.as_ref(), quantity)?;
        Ok(order.push(line))
    }

    pub fn add_lab_test(&self, order: &mut Order, name: &str) -> DomainResult<usize> {
        let price = self.catalog.price_of(name);
        Ok(order.push(OrderLine::lab_test(name, price)?))
    }

    pub fn remove_line(&self, order: &mut Order, index: usize) -> DomainResult<()> {
        order.remove(index).map(|_| ())
    }

    /// Points a medicine line at another batch, re-reading its sale price and tax.
    pub fn change_batch(&self, order: &mut Order, index: usize, batch_id: BatchId) -> DomainResult<()> {
        let batch = self
            .ledger
            .batch(batch_id)
            .ok_or_else(|| DomainError::not_found(format!("batch {batch_id}")))?;

        let line = order.line_mut(index)?;
        if line.kind() != LineKind::Medicine {
            return Err(DomainError::validation(format!(
                "line {index} is not a medicine line; only medicine lines draw from a batch"
            )));
        }
        line.set_batch(&batch)
    }

    /// Sets a line's quantity; negative input clamps to zero.
    pub fn change_quantity(&self, order: &mut Order, index: usize, quantity: i64) -> DomainResult<()> {
        let quantity = u64::try_from(quantity.max(0)).unwrap_or(0);
        order.line_mut(index)?.set_quantity(quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{InMemoryTestCatalog, PrescribedMedication, PrescriptionId};
    use clinicrx_inventory::{BatchFields, DrugDescriptor, StockBatch};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn test_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    fn test_receive(ledger: &StockLedger, text: &str, batch_number: &str, price: Decimal, tax: Decimal) -> StockBatch {
        ledger
            .receive_stock(
                DrugDescriptor::parse(text).unwrap(),
                BatchFields {
                    batch_number: batch_number.to_string(),
                    expiry_date: NaiveDate::from_ymd_opt(2027, 6, 30).unwrap(),
                    purchase_price: dec!(7),
                    sale_price: price,
                    tax_percent: tax,
                    quantity: 100,
                    supplier_id: None,
                },
            )
            .unwrap()
    }

    fn test_catalog() -> InMemoryTestCatalog {
        InMemoryTestCatalog::new()
            .with_test("Complete Blood Count", dec!(350))
            .with_test("Consultation", dec!(500))
    }

    fn test_prescription(medications: Vec<(&str, u64)>, lab_tests: Vec<&str>) -> Prescription {
        Prescription {
            id: PrescriptionId::new("RX-100").unwrap(),
            patient_name: "Asha Rao".to_string(),
            medications: medications
                .into_iter()
                .map(|(name, quantity)| PrescribedMedication {
                    name: name.to_string(),
                    quantity,
                })
                .collect(),
            lab_tests: lab_tests.into_iter().map(str::to_string).collect(),
        }
    }

    #[test]
    fn prescription_line_is_priced_from_matching_batch() {
        let ledger = StockLedger::new();
        test_receive(&ledger, "Tab. Paracetamol 500mg", "P-01", dec!(10), dec!(5));
        let catalog = test_catalog();
        let builder = OrderBuilder::new(&ledger, &catalog).on_date(test_today());

        let order = builder
            .from_prescription(&test_prescription(vec![("tab.  paracetamol 500mg", 30)], vec![]))
            .unwrap();

        assert_eq!(order.domain(), BillingDomain::Pharmacy);
        assert_eq!(order.subject_name(), "Asha Rao");
        let line = &order.lines()[0];
        assert_eq!(line.line_amount(), dec!(300));
        assert_eq!(line.tax_percent(), dec!(5));
        assert_eq!(line.batch().unwrap().batch_number, "P-01");
    }

    #[test]
    fn lab_tests_are_priced_from_catalog_not_ledger() {
        let ledger = StockLedger::new();
        let catalog = test_catalog();
        let builder = OrderBuilder::new(&ledger, &catalog).on_date(test_today());

        let order = builder
            .from_prescription(&test_prescription(vec![], vec!["complete blood count", "MRI"]))
            .unwrap();

        assert_eq!(order.domain(), BillingDomain::Lab);
        assert_eq!(order.lines()[0].line_amount(), dec!(350));
        assert_eq!(order.lines()[0].kind(), LineKind::LabTest);
        assert_eq!(order.unresolved_lines(), vec![1]);
    }

    #[test]
    fn unknown_medicine_is_kept_as_unresolved_line() {
        let ledger = StockLedger::new();
        let catalog = test_catalog();
        let builder = OrderBuilder::new(&ledger, &catalog).on_date(test_today());

        let order = builder.from_manual_entry(
            "Walk-in",
            &[ManualLine::Medicine {
                name: "Cap. Omeprazole 20mg".to_string(),
                quantity: 2,
            }],
        )
        .unwrap();

        assert_eq!(order.lines().len(), 1);
        assert!(!order.lines()[0].is_resolved());
        assert_eq!(order.lines()[0].line_amount(), Decimal::ZERO);
    }

    #[test]
    fn change_batch_rereads_price_and_tax() {
        let ledger = StockLedger::new();
        test_receive(&ledger, "Tab. Paracetamol 500mg", "OLD", dec!(10), dec!(5));
        let dearer = test_receive(&ledger, "Tab. Paracetamol 500mg", "NEW", dec!(12), dec!(12));
        let catalog = test_catalog();
        let builder = OrderBuilder::new(&ledger, &catalog).on_date(test_today());

        let mut order = Order::new(BillingDomain::Pharmacy, "Walk-in", None);
        let idx = builder.add_line(&mut order, "Tab. Paracetamol 500mg", 3).unwrap();
        builder.change_batch(&mut order, idx, dearer.id_typed()).unwrap();

        let line = &order.lines()[idx];
        assert_eq!(line.line_amount(), dec!(36));
        assert_eq!(line.tax_percent(), dec!(12));
    }

    #[test]
    fn change_batch_rejects_unknown_batch_and_service_lines() {
        let ledger = StockLedger::new();
        let batch = test_receive(&ledger, "Tab. Paracetamol 500mg", "P-01", dec!(10), dec!(5));
        let catalog = test_catalog();
        let builder = OrderBuilder::new(&ledger, &catalog).on_date(test_today());

        let mut order = builder.service_order(
            BillingDomain::Consultation,
            "Asha Rao",
            &[ServiceLine {
                name: "Consultation".to_string(),
                unit_price: None,
                quantity: 1,
            }],
        )
        .unwrap();

        let err = builder.change_batch(&mut order, 0, BatchId::new()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let err = builder.change_batch(&mut order, 0, batch.id_typed()).unwrap_err();
        assert!(err.is_validation());

        let err = builder.change_batch(&mut order, 5, batch.id_typed()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn service_price_from_caller_wins_over_catalog() {
        let ledger = StockLedger::new();
        let catalog = test_catalog();
        let builder = OrderBuilder::new(&ledger, &catalog);

        let order = builder.service_order(
            BillingDomain::Consultation,
            "Asha Rao",
            &[
                ServiceLine {
                    name: "Consultation".to_string(),
                    unit_price: Some(dec!(650)),
                    quantity: 1,
                },
                ServiceLine {
                    name: "consultation".to_string(),
                    unit_price: None,
                    quantity: 2,
                },
            ],
        )
        .unwrap();

        assert_eq!(order.lines()[0].line_amount(), dec!(650));
        assert_eq!(order.lines()[1].line_amount(), dec!(1000));
    }

    #[test]
    fn remove_line_shrinks_order() {
        let ledger = StockLedger::new();
        let catalog = test_catalog();
        let builder = OrderBuilder::new(&ledger, &catalog);

        let mut order = Order::new(BillingDomain::Lab, "Walk-in", None);
        builder.add_lab_test(&mut order, "Complete Blood Count").unwrap();
        builder.add_lab_test(&mut order, "Consultation").unwrap();

        builder.remove_line(&mut order, 0).unwrap();
        assert_eq!(order.lines().len(), 1);
        assert_eq!(order.lines()[0].description(), "Consultation");
        assert!(builder.remove_line(&mut order, 3).is_err());
    }

    #[test]
    fn huge_quantity_is_rejected_instead_of_overflowing() {
        let ledger = StockLedger::new();
        test_receive(&ledger, "Tab. Paracetamol 500mg", "P-01", dec!(10000000000), dec!(5));
        let catalog = test_catalog();
        let builder = OrderBuilder::new(&ledger, &catalog).on_date(test_today());

        let mut order = Order::new(BillingDomain::Pharmacy, "Walk-in", None);
        let err = builder
            .add_line(&mut order, "Tab. Paracetamol 500mg", u64::MAX)
            .unwrap_err();
        assert!(err.is_validation());
        assert!(order.lines().is_empty());

        let idx = builder.add_line(&mut order, "Tab. Paracetamol 500mg", 1).unwrap();
        let err = builder.change_quantity(&mut order, idx, i64::MAX).unwrap_err();
        assert!(err.to_string().contains("line amount out of range"));
        assert_eq!(order.lines()[idx].quantity(), 1);
        assert_eq!(order.lines()[idx].line_amount(), dec!(10000000000));

        let manual = builder.from_manual_entry(
            "Walk-in",
            &[ManualLine::Medicine {
                name: "Tab. Paracetamol 500mg".to_string(),
                quantity: u64::MAX,
            }],
        );
        assert!(manual.is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        #[test]
        fn quantity_changes_keep_line_amount_consistent(changes in proptest::collection::vec(-50i64..500, 1..20)) {
            let ledger = StockLedger::new();
            test_receive(&ledger, "Tab. Paracetamol 500mg", "P-01", dec!(10.25), dec!(5));
            let catalog = test_catalog();
            let builder = OrderBuilder::new(&ledger, &catalog).on_date(test_today());

            let mut order = Order::new(BillingDomain::Pharmacy, "Walk-in", None);
            let idx = builder.add_line(&mut order, "Tab. Paracetamol 500mg", 1).unwrap();

            for q in changes {
                builder.change_quantity(&mut order, idx, q).unwrap();
                let line = &order.lines()[idx];
                prop_assert_eq!(line.quantity(), q.max(0) as u64);
                prop_assert_eq!(line.line_amount(), dec!(10.25) * Decimal::from(line.quantity()));
            }
        }
    }
}
