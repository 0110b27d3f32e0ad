use super::{ExtractedInvoice, InvoiceLineItem};
use crate::catalog::RawMaterial;
use regex::Regex;
use time::Date;
use time::macros::format_description;

/// Description substrings, checked in order against the lower-cased
/// description. The more specific chuck spellings must stay ahead of the
/// shorter ones.
const PRODUCT_ALIASES: &[(&str, RawMaterial)] = &[
    ("chuck 2pc bnls", RawMaterial::TwoPcChuck),
    ("chuck 2pc", RawMaterial::TwoPcChuck),
    ("outside skirt", RawMaterial::OutsideSkirt),
    ("brisket", RawMaterial::Brisket),
    ("ribeye", RawMaterial::Ribeye),
];

/// Main extraction entry point: keyword-anchored regex patterns.
pub fn extract(text: &str) -> ExtractedInvoice {
    ExtractedInvoice {
        invoice_date: extract_invoice_date(text),
        invoice_number: extract_invoice_number(text),
        line_items: extract_line_items(text),
    }
}

pub fn normalize_product(description: &str) -> Option<RawMaterial> {
    let lowered = description.to_lowercase();
    PRODUCT_ALIASES
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, material)| *material)
}

// ---------------------------------------------------------------------------
// Scalar field extractors
// ---------------------------------------------------------------------------

fn extract_invoice_date(text: &str) -> Option<Date> {
    let re = Regex::new(r"(?i)Invoice Date:\s*(\d{2}/\d{2}/\d{4})").ok()?;
    let raw = re.captures(text)?;
    // Only the first labelled date counts; a bad one is left unset.
    Date::parse(&raw[1], format_description!("[month]/[day]/[year]")).ok()
}

fn extract_invoice_number(text: &str) -> Option<String> {
    // A line reading just "Invoice", the number starts the next line.
    let re = Regex::new(r"(?im)^[ \t]*Invoice[ \t]*\r?\n[ \t]*(\d+)").ok()?;
    re.captures(text).map(|c| c[1].to_string())
}

// ---------------------------------------------------------------------------
// Line items extraction
// ---------------------------------------------------------------------------

fn extract_line_items(text: &str) -> Vec<InvoiceLineItem> {
    // <line> <item> <description> <qty>[,] LB <price/lb> <total>
    let Ok(row_re) = Regex::new(
        r"(?im)^[ \t]*\d+[ \t]+\d+[ \t]+(.+?)[ \t]+(\d[\d,]*(?:\.\d+)?),?[ \t]+LB[ \t]+(\d+(?:\.\d+)?)[ \t]+(\d[\d,]*(?:\.\d+)?)[ \t]*\r?$",
    ) else {
        return Vec::new();
    };

    row_re
        .captures_iter(text)
        .filter_map(|cap| {
            let raw_material = normalize_product(cap[1].trim())?;
            Some(InvoiceLineItem {
                raw_material,
                quantity: parse_number(&cap[2])?,
                price_per_lb: parse_number(&cap[3])?,
                total: parse_number(&cap[4])?,
            })
        })
        .collect()
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}
