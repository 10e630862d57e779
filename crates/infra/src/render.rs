//! Bill rendering.

use std::fmt::Write;

use clinicrx_billing::Bill;
use clinicrx_core::money::{format_amount, round_for_display};

/// Pure function of a finalized bill to a printable document.
pub trait BillRenderer: Send + Sync {
    type Output;

    fn render(&self, bill: &Bill) -> Self::Output;
}

/// Fixed-width plain-text receipt for counter printers.
#[derive(Debug, Clone)]
pub struct PlainTextReceipt {
    pub header: String,
    pub width: usize,
}

impl Default for PlainTextReceipt {
    fn default() -> Self {
        Self {
            header: "CLINIC PHARMACY".to_string(),
            width: 48,
        }
    }
}

impl PlainTextReceipt {
    fn rule(&self, out: &mut String) {
        out.push_str(&"-".repeat(self.width));
        out.push('\n');
    }

    fn row(&self, out: &mut String, label: &str, amount: &str) {
        let pad = self.width.saturating_sub(label.chars().count() + amount.len()).max(1);
        let _ = writeln!(out, "{label}{}{amount}", " ".repeat(pad));
    }
}

impl BillRenderer for PlainTextReceipt {
    type Output = String;

    fn render(&self, bill: &Bill) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:^width$}", self.header, width = self.width);
        self.rule(&mut out);
        let _ = writeln!(out, "Bill: {}", bill.id_typed());
        let _ = writeln!(out, "Date: {}", bill.issued_at().format("%Y-%m-%d %H:%M"));
        if !bill.subject_name().is_empty() {
            let _ = writeln!(out, "Name: {}", bill.subject_name());
        }
        if let Some(source) = bill.source() {
            let _ = writeln!(out, "Prescription: {source}");
        }
        self.rule(&mut out);

        for line in bill.lines() {
            let _ = writeln!(out, "{}", line.description);
            if let Some(batch) = &line.batch {
                let _ = writeln!(out, "  batch {} exp {}", batch.batch_number, batch.expiry_date.format("%m/%Y"));
            }
            let qty = format!("  {} x {}", line.quantity, format_amount(line.unit_price));
            self.row(&mut out, &qty, &format_amount(line.line_amount));
        }

        self.rule(&mut out);
        self.row(&mut out, "Subtotal", &format_amount(bill.subtotal()));
        if !bill.discount_percent().is_zero() {
            self.row(
                &mut out,
                &format!("Discount {}%", round_for_display(bill.discount_percent()).normalize()),
                &format_amount(bill.subtotal() - bill.total()),
            );
        }
        self.row(&mut out, "Tax (incl.)", &format_amount(bill.tax_total()));
        self.row(&mut out, "TOTAL", &format_amount(bill.total()));
        out
    }
}
