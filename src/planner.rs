// src/planner.rs

use crate::catalog::{RawMaterial, YieldCatalog};
use crate::error::CoreError;
use serde::Serialize;
use std::collections::HashMap;

/// Raw material that still has to be ordered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShortfallEntry {
    #[serde(rename = "Raw Material")]
    pub raw_material: RawMaterial,
    #[serde(rename = "Total Required (lbs)")]
    pub total_required: f64,
    #[serde(rename = "Current Inventory (finished lbs)")]
    pub on_hand_finished: f64,
    #[serde(rename = "Current Inventory (raw lbs)")]
    pub on_hand_raw: f64,
    #[serde(rename = "New Order Needed (lbs)")]
    pub new_order_needed: f64,
}

/// Net case orders against on-hand inventory, per raw material.
///
/// On-hand pounds are finished-equivalent and are converted back to raw
/// pounds with the raw material's reference yield (see
/// [`YieldCatalog::reference_yield`]). Only materials with a positive
/// shortfall are returned, in raw-material declaration order.
pub fn plan(
    catalog: &YieldCatalog,
    case_orders: &HashMap<String, i64>,
    on_hand: &HashMap<RawMaterial, f64>,
) -> Result<Vec<ShortfallEntry>, CoreError> {
    for (product, &cases) in case_orders {
        if cases < 0 {
            return Err(CoreError::invalid_argument(format!(
                "case count for {product} must not be negative, got {cases}"
            )));
        }
    }
    for (material, &lbs) in on_hand {
        if !(lbs.is_finite() && lbs >= 0.0) {
            return Err(CoreError::invalid_argument(format!(
                "on-hand {material} must be a non-negative number, got {lbs}"
            )));
        }
    }

    let mut required: HashMap<RawMaterial, f64> =
        RawMaterial::ALL.into_iter().map(|m| (m, 0.0)).collect();

    for (product, &cases) in case_orders {
        if cases == 0 {
            continue;
        }
        let spec = catalog.get(product)?;
        let finished_lbs = cases as f64 * spec.avg_case_weight;
        *required.entry(spec.raw_material).or_default() += finished_lbs / spec.yield_rate;
    }

    let mut entries = Vec::new();
    for material in RawMaterial::ALL {
        let total_required = required[&material];
        if total_required <= 0.0 {
            continue;
        }

        let on_hand_finished = on_hand.get(&material).copied().unwrap_or(0.0);
        // Demand exists, so some product uses this material and has a reference.
        let on_hand_raw = match catalog.reference_yield(material) {
            Some(reference) => on_hand_finished / reference,
            None => 0.0,
        };

        let new_order_needed = (total_required - on_hand_raw).max(0.0);
        if new_order_needed > 0.0 {
            entries.push(ShortfallEntry {
                raw_material: material,
                total_required,
                on_hand_finished,
                on_hand_raw,
                new_order_needed,
            });
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RIBEYE: &str = "WF Kosher Boneless Beef Ribeye Steak";
    const BRISKET_FLAT: &str = "WF Kosher Boneless Beef Brisket Flat Cut";
    const CHUCK_ROAST: &str = "WF Kosher Boneless Beef Chuck Roast";
    const STEW: &str = "WF Kosher Beef Stew";
    const SKIRT: &str = "WF Kosher Beef Outside Skirt Steak";

    fn orders(items: &[(&str, i64)]) -> HashMap<String, i64> {
        items.iter().map(|(p, c)| (p.to_string(), *c)).collect()
    }

    #[test]
    fn test_empty_orders() {
        let catalog = YieldCatalog::builtin();
        let inventory = HashMap::from([(RawMaterial::Brisket, 50.0)]);
        assert!(plan(&catalog, &HashMap::new(), &inventory).unwrap().is_empty());
        assert!(plan(&catalog, &orders(&[(BRISKET_FLAT, 0)]), &inventory)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_brisket_example() {
        let catalog = YieldCatalog::builtin();
        let inventory = HashMap::from([(RawMaterial::Brisket, 0.0)]);
        let entries = plan(&catalog, &orders(&[(BRISKET_FLAT, 10)]), &inventory).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.raw_material, RawMaterial::Brisket);
        assert!((entry.total_required - 483.3).abs() < 0.05);
        assert!((entry.new_order_needed - 483.3).abs() < 0.05);
        assert_eq!(entry.on_hand_raw, 0.0);
    }

    #[test]
    fn test_inventory_uses_reference_yield() {
        let catalog = YieldCatalog::builtin();
        // 4 cases of stew: 32 finished lbs at 0.489375 -> ~65.39 raw lbs.
        // 10 finished lbs on hand at the chuck roast yield -> 36.57 raw lbs.
        let inventory = HashMap::from([(RawMaterial::TwoPcChuck, 10.0)]);
        let entries = plan(&catalog, &orders(&[(STEW, 4)]), &inventory).unwrap();
        let entry = &entries[0];
        assert!((entry.total_required - 32.0 / 0.489375).abs() < 1e-9);
        assert!((entry.on_hand_raw - 10.0 / 0.2734375).abs() < 1e-9);
        assert!((entry.new_order_needed - (32.0 / 0.489375 - 10.0 / 0.2734375)).abs() < 1e-9);
    }

    #[test]
    fn test_shared_raw_material_accumulates() {
        let catalog = YieldCatalog::builtin();
        let entries = plan(
            &catalog,
            &orders(&[(CHUCK_ROAST, 2), (STEW, 3)]),
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
        let expected = 22.0 / 0.2734375 + 24.0 / 0.489375;
        assert!((entries[0].total_required - expected).abs() < 1e-9);
    }

    #[test]
    fn test_sufficient_inventory_is_omitted() {
        let catalog = YieldCatalog::builtin();
        let inventory = HashMap::from([(RawMaterial::Ribeye, 1000.0)]);
        let entries = plan(&catalog, &orders(&[(RIBEYE, 5), (SKIRT, 1)]), &inventory).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raw_material, RawMaterial::OutsideSkirt);
        assert!(entries.iter().all(|e| e.new_order_needed >= 0.0));
    }

    #[test]
    fn test_declaration_order() {
        let catalog = YieldCatalog::builtin();
        let entries = plan(
            &catalog,
            &orders(&[(SKIRT, 1), (STEW, 1), (BRISKET_FLAT, 1), (RIBEYE, 1)]),
            &HashMap::new(),
        )
        .unwrap();
        let materials: Vec<_> = entries.iter().map(|e| e.raw_material).collect();
        assert_eq!(materials, RawMaterial::ALL.to_vec());
    }

    #[test]
    fn test_invalid_arguments() {
        let catalog = YieldCatalog::builtin();
        assert!(matches!(
            plan(&catalog, &orders(&[(RIBEYE, -1)]), &HashMap::new()),
            Err(CoreError::InvalidArgument(_))
        ));
        let inventory = HashMap::from([(RawMaterial::Ribeye, -5.0)]);
        assert!(matches!(
            plan(&catalog, &HashMap::new(), &inventory),
            Err(CoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            plan(&catalog, &orders(&[("Tongue", 2)]), &HashMap::new()),
            Err(CoreError::NotFound(_))
        ));
    }
}
