// src/dashboard.rs

use crate::record_db::{InventoryLevel, ProductionRecord};
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventorySummary {
    /// Current quantity valued at each material's last purchase price.
    pub total_value: f64,
    pub total_quantity: f64,
    pub total_used: f64,
}

pub fn inventory_summary(levels: &[InventoryLevel]) -> InventorySummary {
    InventorySummary {
        total_value: levels
            .iter()
            .map(|l| l.current_quantity * l.last_purchase_price.unwrap_or(0.0))
            .sum(),
        total_quantity: levels.iter().map(|l| l.current_quantity).sum(),
        total_used: levels.iter().map(|l| l.used_in_production).sum(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionMetrics {
    pub runs: usize,
    pub average_yield: Option<f64>,
    pub total_input: f64,
    pub total_output: f64,
}

pub fn production_metrics(records: &[ProductionRecord]) -> ProductionMetrics {
    let runs = records.len();
    let average_yield =
        (runs > 0).then(|| records.iter().map(|r| r.yield_rate).sum::<f64>() / runs as f64);
    ProductionMetrics {
        runs,
        average_yield,
        total_input: records.iter().map(|r| r.input_quantity).sum(),
        total_output: records.iter().map(|r| r.output_quantity).sum(),
    }
}

/// Sort production runs by the first number in their PO; runs without one go last.
pub fn sort_by_po(records: &mut [ProductionRecord]) {
    let Ok(re) = Regex::new(r"(\d+)") else {
        return;
    };
    let key = |po: Option<&str>| -> u64 {
        po.and_then(|po| re.captures(po))
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(u64::MAX)
    };
    records.sort_by_key(|r| key(r.po_number.as_deref()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RawMaterial;

    fn run(po: Option<&str>, input: f64, output: f64) -> ProductionRecord {
        ProductionRecord::new(
            po.map(str::to_string),
            "WF Kosher Beef Stew".to_string(),
            RawMaterial::TwoPcChuck,
            input,
            output,
        )
        .unwrap()
    }

    #[test]
    fn test_production_metrics() {
        let records = vec![run(Some("PO-1"), 100.0, 50.0), run(Some("PO-2"), 200.0, 50.0)];
        let metrics = production_metrics(&records);
        assert_eq!(metrics.runs, 2);
        assert_eq!(metrics.average_yield, Some(0.375));
        assert_eq!(metrics.total_input, 300.0);
        assert_eq!(metrics.total_output, 100.0);
        assert_eq!(production_metrics(&[]).average_yield, None);
    }

    #[test]
    fn test_sort_by_po() {
        let mut records = vec![
            run(None, 1.0, 1.0),
            run(Some("PO-110"), 1.0, 1.0),
            run(Some("rush"), 1.0, 1.0),
            run(Some("PO-9"), 1.0, 1.0),
        ];
        sort_by_po(&mut records);
        let pos: Vec<_> = records.iter().map(|r| r.po_number.as_deref()).collect();
        assert_eq!(pos, vec![Some("PO-9"), Some("PO-110"), None, Some("rush")]);
    }

    #[test]
    fn test_inventory_summary() {
        let levels = vec![
            InventoryLevel {
                material: RawMaterial::Brisket,
                total_purchased: 500.0,
                used_in_production: 100.0,
                current_quantity: 400.0,
                last_purchase_price: Some(3.5),
                last_purchase_date: None,
            },
            InventoryLevel {
                material: RawMaterial::Ribeye,
                total_purchased: 0.0,
                used_in_production: 20.0,
                current_quantity: -20.0,
                last_purchase_price: None,
                last_purchase_date: None,
            },
        ];
        let summary = inventory_summary(&levels);
        assert_eq!(summary.total_value, 1400.0);
        assert_eq!(summary.total_quantity, 380.0);
        assert_eq!(summary.total_used, 120.0);
    }
}
