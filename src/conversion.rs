// src/conversion.rs

use crate::catalog::{RawMaterial, YieldCatalog};
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Secondary output of one conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoProductQuantity {
    pub product: String,
    pub quantity: f64,
}

/// Raw material and cost behind a finished quantity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionResult {
    pub product: String,
    pub finished_quantity: f64,
    pub raw_material: RawMaterial,
    pub raw_quantity: f64,
    pub cost: f64,
    /// Free extra yield from the same raw input; never part of `cost`.
    pub co_products: Vec<CoProductQuantity>,
}

/// Raw pounds, cost and co-products needed for `finished_quantity` pounds of `product`.
pub fn convert(
    catalog: &YieldCatalog,
    product: &str,
    finished_quantity: f64,
) -> Result<ConversionResult, CoreError> {
    if !(finished_quantity.is_finite() && finished_quantity >= 0.0) {
        return Err(CoreError::invalid_argument(format!(
            "finished quantity must be a non-negative number, got {finished_quantity}"
        )));
    }
    let spec = catalog.get(product)?;

    let raw_quantity = finished_quantity / spec.yield_rate;
    let co_products = spec
        .co_products
        .iter()
        .map(|co| CoProductQuantity {
            product: co.name.clone(),
            quantity: raw_quantity * co.yield_rate,
        })
        .collect();

    Ok(ConversionResult {
        product: spec.name.clone(),
        finished_quantity,
        raw_material: spec.raw_material,
        raw_quantity,
        cost: raw_quantity * spec.unit_cost,
        co_products,
    })
}

/// Same as [`convert`], with the order given in cases.
pub fn convert_cases(
    catalog: &YieldCatalog,
    product: &str,
    cases: f64,
) -> Result<ConversionResult, CoreError> {
    if !(cases.is_finite() && cases >= 0.0) {
        return Err(CoreError::invalid_argument(format!(
            "case count must be a non-negative number, got {cases}"
        )));
    }
    let spec = catalog.get(product)?;
    convert(catalog, product, cases * spec.avg_case_weight)
}

/// One requested line of a purchase order, in finished pounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product: String,
    pub quantity: f64,
}

/// Standing orders that can be loaded as a starting point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OrderTemplate {
    /// Ribeye steak and brisket flat.
    CommonA,
    /// Chuck roast and outside skirt.
    CommonB,
}

impl OrderTemplate {
    pub fn lines(self) -> Vec<OrderLine> {
        let items: &[(&str, f64)] = match self {
            OrderTemplate::CommonA => &[
                ("WF Kosher Boneless Beef Ribeye Steak", 100.0),
                ("WF Kosher Boneless Beef Brisket Flat Cut", 50.0),
            ],
            OrderTemplate::CommonB => &[
                ("WF Kosher Boneless Beef Chuck Roast", 75.0),
                ("WF Kosher Beef Outside Skirt Steak", 25.0),
            ],
        };
        items
            .iter()
            .map(|&(product, quantity)| OrderLine {
                product: product.to_string(),
                quantity,
            })
            .collect()
    }
}

/// Conversions for every line of an order plus the total cost.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub results: Vec<ConversionResult>,
    pub total_cost: f64,
}

/// A display row of the order summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    #[serde(rename = "Product")]
    pub product: String,
    #[serde(rename = "Order Quantity (lbs)")]
    pub quantity: String,
    #[serde(rename = "Raw Material (lbs)")]
    pub raw_material: String,
    #[serde(rename = "Cost")]
    pub cost: String,
}

impl OrderSummary {
    /// Lines with a zero quantity are left out.
    pub fn build(catalog: &YieldCatalog, lines: &[OrderLine]) -> Result<Self, CoreError> {
        let mut results = Vec::new();
        for line in lines {
            let result = convert(catalog, &line.product, line.quantity)?;
            if line.quantity > 0.0 {
                results.push(result);
            }
        }
        let total_cost = results.iter().map(|r| r.cost).sum();
        Ok(Self {
            results,
            total_cost,
        })
    }

    pub fn summary_rows(&self) -> Vec<SummaryRow> {
        let mut rows = Vec::new();
        for result in &self.results {
            rows.push(SummaryRow {
                product: result.product.clone(),
                quantity: format!("{:.1}", result.finished_quantity),
                raw_material: format!("{:.1}", result.raw_quantity),
                cost: format!("${:.2}", result.cost),
            });
            for co in &result.co_products {
                rows.push(SummaryRow {
                    product: format!("→ {}", co.product),
                    quantity: format!("{:.1}", co.quantity),
                    raw_material: "-".to_string(),
                    cost: "-".to_string(),
                });
            }
        }
        rows
    }

    /// Export the summary table as CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        for row in self.summary_rows() {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RIBEYE: &str = "WF Kosher Boneless Beef Ribeye Steak";
    const BRISKET_FLAT: &str = "WF Kosher Boneless Beef Brisket Flat Cut";
    const CHUCK_ROAST: &str = "WF Kosher Boneless Beef Chuck Roast";

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_raw_quantity_inverts_yield() {
        let catalog = YieldCatalog::builtin();
        for spec in catalog.products() {
            for q in [0.0, 1.0, 37.5, 1200.0] {
                let result = convert(&catalog, &spec.name, q).unwrap();
                assert!(close(result.raw_quantity, q / spec.yield_rate));
                assert!(close(result.raw_quantity * spec.yield_rate, q));
                assert!(close(result.cost, result.raw_quantity * spec.unit_cost));
                assert_eq!(result.raw_material, spec.raw_material);
            }
        }
    }

    #[test]
    fn test_ribeye() {
        let catalog = YieldCatalog::builtin();
        let result = convert(&catalog, RIBEYE, 75.0).unwrap();
        assert!(close(result.raw_quantity, 100.0));
        assert!(close(result.cost, 158.0));
        assert!(result.co_products.is_empty());
    }

    #[test]
    fn test_zero_quantity_keeps_co_products() {
        let catalog = YieldCatalog::builtin();
        let result = convert(&catalog, BRISKET_FLAT, 0.0).unwrap();
        assert_eq!(result.raw_quantity, 0.0);
        assert_eq!(result.cost, 0.0);
        assert_eq!(result.co_products.len(), 2);
        assert!(result.co_products.iter().all(|c| c.quantity == 0.0));
    }

    #[test]
    fn test_co_products_scale_linearly() {
        let catalog = YieldCatalog::builtin();
        let single = convert(&catalog, CHUCK_ROAST, 50.0).unwrap();
        let double = convert(&catalog, CHUCK_ROAST, 100.0).unwrap();
        assert_eq!(single.co_products[0].product, "Short Rib");
        assert_eq!(single.co_products[1].product, "Grind");
        for (a, b) in single.co_products.iter().zip(&double.co_products) {
            assert!(close(b.quantity, 2.0 * a.quantity));
        }
    }

    #[test]
    fn test_co_products_do_not_change_cost() {
        let catalog = YieldCatalog::builtin();
        let result = convert(&catalog, BRISKET_FLAT, 100.0).unwrap();
        let raw = 100.0 / 0.4551971326;
        assert!(close(result.cost, raw * 1.38));
        assert!(close(result.co_products[0].quantity, raw * 0.1935483871));
    }

    #[test]
    fn test_errors() {
        let catalog = YieldCatalog::builtin();
        assert!(matches!(
            convert(&catalog, "Tongue", 10.0),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            convert(&catalog, RIBEYE, -1.0),
            Err(CoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            convert(&catalog, RIBEYE, f64::NAN),
            Err(CoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_convert_cases() {
        let catalog = YieldCatalog::builtin();
        let result = convert_cases(&catalog, BRISKET_FLAT, 10.0).unwrap();
        assert!(close(result.finished_quantity, 220.0));
        assert!((result.raw_quantity - 483.31).abs() < 0.01);
    }

    #[test]
    fn test_order_summary() {
        let catalog = YieldCatalog::builtin();
        let lines = vec![
            OrderLine { product: RIBEYE.to_string(), quantity: 75.0 },
            OrderLine { product: BRISKET_FLAT.to_string(), quantity: 0.0 },
            OrderLine { product: CHUCK_ROAST.to_string(), quantity: 11.0 },
        ];
        let summary = OrderSummary::build(&catalog, &lines).unwrap();
        assert_eq!(summary.results.len(), 2);
        let expected = 158.0 + (11.0 / 0.2734375) * 1.19;
        assert!(close(summary.total_cost, expected));

        let rows = summary.summary_rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].raw_material, "100.0");
        assert_eq!(rows[0].cost, "$158.00");
        assert_eq!(rows[2].product, "→ Short Rib");
        assert_eq!(rows[2].cost, "-");
    }

    #[test]
    fn test_summary_csv() {
        let catalog = YieldCatalog::builtin();
        let lines = vec![OrderLine { product: RIBEYE.to_string(), quantity: 75.0 }];
        let summary = OrderSummary::build(&catalog, &lines).unwrap();
        let mut out = Vec::new();
        summary.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Product,Order Quantity (lbs),Raw Material (lbs),Cost")
        );
        assert_eq!(
            lines.next(),
            Some("WF Kosher Boneless Beef Ribeye Steak,75.0,100.0,$158.00")
        );
    }

    #[test]
    fn test_templates_use_catalog_products() {
        let catalog = YieldCatalog::builtin();
        for template in [OrderTemplate::CommonA, OrderTemplate::CommonB] {
            let lines = template.lines();
            assert_eq!(lines.len(), 2);
            let summary = OrderSummary::build(&catalog, &lines).unwrap();
            assert_eq!(summary.results.len(), 2);
        }
        assert_eq!(OrderTemplate::CommonB.lines()[0].quantity, 75.0);
    }
}
