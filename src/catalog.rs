// src/catalog.rs

use crate::error::{CatalogError, CoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::{fs, path::Path};
use tracing::info;

/// Slack allowed when checking that a product's yields do not exceed one pound.
const YIELD_TOLERANCE: f64 = 1e-9;

/// Unprocessed input commodity. Declaration order is the reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RawMaterial {
    #[serde(rename = "RIBEYE")]
    Ribeye,
    #[serde(rename = "BRISKET")]
    Brisket,
    #[serde(rename = "2PC CHUCK")]
    TwoPcChuck,
    #[serde(rename = "OUTSIDE SKIRT")]
    OutsideSkirt,
}

impl RawMaterial {
    pub const ALL: [RawMaterial; 4] = [
        RawMaterial::Ribeye,
        RawMaterial::Brisket,
        RawMaterial::TwoPcChuck,
        RawMaterial::OutsideSkirt,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RawMaterial::Ribeye => "RIBEYE",
            RawMaterial::Brisket => "BRISKET",
            RawMaterial::TwoPcChuck => "2PC CHUCK",
            RawMaterial::OutsideSkirt => "OUTSIDE SKIRT",
        }
    }
}

impl fmt::Display for RawMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RawMaterial {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('_', " ").to_uppercase();
        RawMaterial::ALL
            .into_iter()
            .find(|m| m.label() == wanted)
            .ok_or_else(|| CatalogError::UnknownRawMaterial(s.to_string()))
    }
}

// Catalog files, stored JSON and the command line all accept the same spellings.
impl<'de> Deserialize<'de> for RawMaterial {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}

/// A byproduct obtained from the same raw pound as the primary product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoProduct {
    pub name: String,
    #[serde(rename = "yield")]
    pub yield_rate: f64,
}

/// Static reference data for one finished product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSpec {
    pub name: String,
    /// Pounds per case.
    pub avg_case_weight: f64,
    pub raw_material: RawMaterial,
    /// Finished pounds per raw pound.
    #[serde(rename = "yield")]
    pub yield_rate: f64,
    /// Cost per raw pound consumed.
    pub unit_cost: f64,
    #[serde(default, rename = "co_product")]
    pub co_products: Vec<CoProduct>,
}

impl ProductSpec {
    fn new(
        name: &str,
        avg_case_weight: f64,
        raw_material: RawMaterial,
        yield_rate: f64,
        unit_cost: f64,
        co_products: &[(&str, f64)],
    ) -> Self {
        Self {
            name: name.to_string(),
            avg_case_weight,
            raw_material,
            yield_rate,
            unit_cost,
            co_products: co_products
                .iter()
                .map(|(name, yield_rate)| CoProduct {
                    name: name.to_string(),
                    yield_rate: *yield_rate,
                })
                .collect(),
        }
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidProduct {
            product: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(CatalogError::EmptyName);
        }
        if !(self.avg_case_weight.is_finite() && self.avg_case_weight > 0.0) {
            return Err(invalid(format!(
                "case weight must be positive, got {}",
                self.avg_case_weight
            )));
        }
        if !(self.yield_rate > 0.0 && self.yield_rate <= 1.0) {
            return Err(invalid(format!(
                "yield must be in (0, 1], got {}",
                self.yield_rate
            )));
        }
        if !(self.unit_cost.is_finite() && self.unit_cost >= 0.0) {
            return Err(invalid(format!(
                "unit cost must not be negative, got {}",
                self.unit_cost
            )));
        }
        for co in &self.co_products {
            if !(co.yield_rate.is_finite() && co.yield_rate >= 0.0) {
                return Err(invalid(format!(
                    "co-product {} has invalid yield {}",
                    co.name, co.yield_rate
                )));
            }
        }

        let total = self.yield_rate + self.co_products.iter().map(|c| c.yield_rate).sum::<f64>();
        if total > 1.0 + YIELD_TOLERANCE {
            return Err(invalid(format!(
                "yields from one raw pound add up to {total:.6}"
            )));
        }
        Ok(())
    }
}

/// On-disk shape of a catalog file.
#[derive(Deserialize)]
struct CatalogFile {
    #[serde(rename = "product")]
    products: Vec<ProductSpec>,
    /// Raw-material label -> canonical product name.
    #[serde(default)]
    reference: HashMap<String, String>,
}

/// Finished products keyed by name, plus one canonical product per raw material.
#[derive(Debug, Clone)]
pub struct YieldCatalog {
    products: Vec<ProductSpec>,
    by_name: HashMap<String, usize>,
    references: HashMap<RawMaterial, usize>,
}

impl YieldCatalog {
    /// Build and validate a catalog.
    ///
    /// A raw material without an entry in `references` uses the first product
    /// declared for it as its reference product.
    pub fn new(
        products: Vec<ProductSpec>,
        references: HashMap<RawMaterial, String>,
    ) -> Result<Self, CatalogError> {
        let mut by_name = HashMap::with_capacity(products.len());
        for (idx, product) in products.iter().enumerate() {
            product.validate()?;
            if by_name.insert(product.name.clone(), idx).is_some() {
                return Err(CatalogError::Duplicate(product.name.clone()));
            }
        }

        let mut resolved = HashMap::new();
        for (idx, product) in products.iter().enumerate() {
            resolved.entry(product.raw_material).or_insert(idx);
        }
        for (material, name) in references {
            let idx = *by_name
                .get(&name)
                .ok_or_else(|| CatalogError::InvalidReference {
                    material: material.to_string(),
                    reason: format!("no product named {name}"),
                })?;
            if products[idx].raw_material != material {
                return Err(CatalogError::InvalidReference {
                    material: material.to_string(),
                    reason: format!("{name} is made from {}", products[idx].raw_material),
                });
            }
            resolved.insert(material, idx);
        }

        Ok(Self {
            products,
            by_name,
            references: resolved,
        })
    }

    /// The production catalog.
    pub fn builtin() -> Self {
        use RawMaterial::*;

        let products = vec![
            ProductSpec::new("WF Kosher Boneless Beef Ribeye Steak", 10.0, Ribeye, 0.75, 1.58, &[]),
            ProductSpec::new(
                "WF Kosher Boneless Beef Brisket Flat Cut",
                22.0,
                Brisket,
                0.4551971326,
                1.38,
                &[("Stew", 0.1935483871), ("Grind", 0.1775822744)],
            ),
            ProductSpec::new(
                "WF Kosher Boneless Beef Chuck Roast",
                11.0,
                TwoPcChuck,
                0.2734375,
                1.19,
                &[("Short Rib", 0.1789), ("Grind", 0.489375)],
            ),
            ProductSpec::new(
                "WF Kosher Ground Beef Blend of Chuck & Brisket (80/20)",
                12.0,
                TwoPcChuck,
                0.489375,
                1.11,
                &[],
            ),
            ProductSpec::new("WF Kosher Beef Outside Skirt Steak", 19.0, OutsideSkirt, 0.85, 1.52, &[]),
            ProductSpec::new(
                "WF Kosher Boneless Beef Short Ribs",
                13.0,
                TwoPcChuck,
                0.1789,
                1.51,
                &[("Chuck Roast", 0.2734375), ("Grind", 0.489375)],
            ),
            ProductSpec::new("WF Kosher Beef Stew", 8.0, TwoPcChuck, 0.489375, 1.83, &[]),
        ];

        // First-declared product per raw material is the reference; all the
        // figures above satisfy `ProductSpec::validate`.
        let by_name = products
            .iter()
            .enumerate()
            .map(|(idx, p)| (p.name.clone(), idx))
            .collect();
        let mut references = HashMap::new();
        for (idx, product) in products.iter().enumerate() {
            references.entry(product.raw_material).or_insert(idx);
        }

        Self {
            products,
            by_name,
            references,
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(content)?;
        let references = file
            .reference
            .into_iter()
            .map(|(label, name)| Ok((label.parse::<RawMaterial>()?, name)))
            .collect::<Result<HashMap<_, _>, CatalogError>>()?;
        Self::new(file.products, references)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(&path)?;
        let catalog = Self::from_toml_str(&content)?;
        info!(
            path = %path.as_ref().display(),
            products = catalog.products.len(),
            "Yield catalog loaded"
        );
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Result<&ProductSpec, CoreError> {
        self.by_name
            .get(name)
            .map(|&idx| &self.products[idx])
            .ok_or_else(|| CoreError::not_found(name))
    }

    /// Products in declaration order.
    pub fn products(&self) -> &[ProductSpec] {
        &self.products
    }

    /// Canonical product for a raw material.
    pub fn reference_product(&self, material: RawMaterial) -> Option<&ProductSpec> {
        self.references.get(&material).map(|&idx| &self.products[idx])
    }

    /// Yield used to turn on-hand finished-equivalent pounds of `material`
    /// back into raw pounds. Raw material has no single finished form, so one
    /// product per kind stands in for all of them.
    pub fn reference_yield(&self, material: RawMaterial) -> Option<f64> {
        self.reference_product(material).map(|p| p.yield_rate)
    }
}

impl Default for YieldCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
