// src/heuristics/mod.rs

mod generic;

use crate::catalog::RawMaterial;
use serde::{Deserialize, Serialize};
use time::Date;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Largest gap between `quantity * price_per_lb` and the printed total that
/// is still treated as rounding.
const TOTAL_TOLERANCE: f64 = 0.01;

/// A raw-material line read off a supplier invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub raw_material: RawMaterial,
    /// Pounds.
    pub quantity: f64,
    pub price_per_lb: f64,
    pub total: f64,
}

impl InvoiceLineItem {
    /// The computed total when it disagrees with the printed one.
    pub fn total_mismatch(&self) -> Option<f64> {
        let computed = self.quantity * self.price_per_lb;
        ((computed - self.total).abs() > TOTAL_TOLERANCE).then_some(computed)
    }
}

/// Everything we could read from an invoice.
///
/// This is a proposal for a person to confirm or correct; nothing here is
/// authoritative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInvoice {
    #[serde(with = "iso_date::option")]
    pub invoice_date: Option<Date>,
    pub invoice_number: Option<String>,
    pub line_items: Vec<InvoiceLineItem>,
}

impl ExtractedInvoice {
    /// How many scalar fields were filled in (out of the scalar ones).
    pub fn coverage(&self) -> (usize, usize) {
        let filled = [self.invoice_date.is_some(), self.invoice_number.is_some()]
            .iter()
            .filter(|&&v| v)
            .count();
        (filled, 2)
    }

    /// Sum of the printed line totals.
    pub fn total_cost(&self) -> f64 {
        self.line_items.iter().map(|i| i.total).sum()
    }
}

/// Extract an invoice proposal from OCR text. Never fails.
pub fn extract_invoice(text: &str) -> ExtractedInvoice {
    generic::extract(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_mismatch() {
        let item = InvoiceLineItem {
            raw_material: RawMaterial::Brisket,
            quantity: 1200.0,
            price_per_lb: 3.45,
            total: 4140.0,
        };
        assert_eq!(item.total_mismatch(), None);

        let off = InvoiceLineItem {
            total: 4000.0,
            ..item
        };
        let computed = off.total_mismatch().unwrap();
        assert!((computed - 4140.0).abs() < 1e-6);
    }

    #[test]
    fn test_serialized_date_is_iso() {
        let invoice = ExtractedInvoice {
            invoice_date: Some(time::macros::date!(2025 - 03 - 07)),
            invoice_number: Some("88123".to_string()),
            line_items: Vec::new(),
        };
        let json = serde_json::to_value(&invoice).unwrap();
        assert_eq!(json["invoice_date"], "2025-03-07");
        assert_eq!(invoice.coverage(), (2, 2));

        let back: ExtractedInvoice = serde_json::from_value(json).unwrap();
        assert_eq!(back, invoice);
    }
}
