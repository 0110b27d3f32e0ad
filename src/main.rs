mod board;
mod catalog;
mod config;
mod conversion;
mod dashboard;
mod document;
mod error;
mod heuristics;
mod planner;
mod record_db;

use board::{DateWindow, OrderFilter};
use catalog::{RawMaterial, YieldCatalog};
use clap::{Parser, Subcommand};
use conversion::{OrderLine, OrderSummary, OrderTemplate};
use error::CoreError;
use record_db::{OrderStatus, ProductionRecord, PurchaseRecord, RecordStore, StoredDocument, StoredOrder};
use std::collections::HashMap;
use std::path::PathBuf;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "yield-desk")]
#[command(about = "Order, yield and raw-material desk for a meat-processing plant")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML)
    #[arg(long, global = true, env = "YIELD_DESK_CONFIG", default_value = ".config/yield_desk.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List the products in the yield catalog
    Catalog,

    /// Raw material and cost for a finished quantity of one product
    Convert {
        product: String,
        /// Finished pounds, or cases with --cases
        quantity: f64,
        #[arg(long)]
        cases: bool,
        #[arg(long)]
        json: bool,
    },

    /// Raw-material shortfall for a set of case orders
    Plan {
        /// PRODUCT=CASES, repeatable
        #[arg(long = "cases", value_parser = parse_case_order)]
        cases: Vec<(String, i64)>,
        /// MATERIAL=LBS of finished-equivalent stock, repeatable
        #[arg(long = "on-hand", value_parser = parse_on_hand)]
        on_hand: Vec<(RawMaterial, f64)>,
        #[arg(long)]
        json: bool,
    },

    /// Enter a purchase order and print its summary
    Order {
        #[arg(long)]
        po: String,
        /// Defaults to today
        #[arg(long, value_parser = parse_date)]
        po_date: Option<Date>,
        /// Defaults to a week after the PO date
        #[arg(long, value_parser = parse_date)]
        delivery_date: Option<Date>,
        /// Start from a standing order; --line entries are added after it
        #[arg(long, value_enum)]
        template: Option<OrderTemplate>,
        /// PRODUCT=LBS, repeatable
        #[arg(long = "line", value_parser = parse_order_line)]
        lines: Vec<OrderLine>,
        #[arg(long)]
        notes: Option<String>,
        /// Also write the summary table to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Print the summary without storing the order
        #[arg(long)]
        no_save: bool,
    },

    /// Order board
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },

    /// Record a raw-material purchase
    Purchase {
        #[arg(long, value_parser = parse_material)]
        material: RawMaterial,
        /// Pounds
        #[arg(long)]
        quantity: f64,
        /// Total cost
        #[arg(long)]
        cost: f64,
        #[arg(long)]
        invoice: Option<String>,
        /// Defaults to today
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,
    },

    /// Record a production run and its measured yield
    Production {
        #[arg(long)]
        po: Option<String>,
        #[arg(long)]
        product: String,
        #[arg(long, value_parser = parse_material)]
        input_material: RawMaterial,
        /// Raw pounds consumed
        #[arg(long)]
        input_qty: f64,
        /// Finished pounds produced
        #[arg(long)]
        output_qty: f64,
    },

    /// Read an invoice (PDF or OCR text) and propose purchase records
    Scan {
        path: PathBuf,
        /// Store the proposed line items as purchases
        #[arg(long)]
        save: bool,
        /// Use instead of the extracted invoice number
        #[arg(long)]
        invoice_number: Option<String>,
        /// Use instead of the extracted invoice date
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,
        /// Print the raw extracted text as well
        #[arg(long)]
        show_text: bool,
    },

    /// Inventory levels and production metrics
    Dashboard,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List orders by delivery date
    List {
        /// Repeatable; defaults to pending and in_production
        #[arg(long, value_parser = parse_status)]
        status: Vec<OrderStatus>,
        /// Show every status
        #[arg(long, conflicts_with = "status")]
        all: bool,
        /// PO number substring
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t = DateWindow::All)]
        due: DateWindow,
    },
    /// Change the status of an order
    SetStatus {
        id: i64,
        #[arg(value_parser = parse_status)]
        status: OrderStatus,
    },
}

fn parse_date(s: &str) -> Result<Date, String> {
    Date::parse(s, format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn parse_material(s: &str) -> Result<RawMaterial, String> {
    s.parse().map_err(|e: error::CatalogError| e.to_string())
}

fn parse_status(s: &str) -> Result<OrderStatus, String> {
    s.parse().map_err(|e: error::StoreError| e.to_string())
}

fn split_pair(s: &str) -> Result<(&str, &str), String> {
    s.rsplit_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .ok_or_else(|| format!("expected NAME=VALUE, got {s}"))
}

fn parse_case_order(s: &str) -> Result<(String, i64), String> {
    let (product, cases) = split_pair(s)?;
    let count: i64 = cases.parse().map_err(|e| format!("bad case count {cases}: {e}"))?;
    if count < 0 {
        return Err(format!("case count for {product} must not be negative"));
    }
    Ok((product.to_string(), count))
}

/// Combine repeated `--cases` entries for the same product.
fn merge_case_orders(cases: Vec<(String, i64)>) -> Result<HashMap<String, i64>, CoreError> {
    let mut merged: HashMap<String, i64> = HashMap::new();
    for (product, count) in cases {
        if count < 0 {
            return Err(CoreError::invalid_argument(format!(
                "case count for {product} must not be negative, got {count}"
            )));
        }
        let total = merged.entry(product).or_default();
        *total = total
            .checked_add(count)
            .ok_or_else(|| CoreError::invalid_argument("case count is too large"))?;
    }
    Ok(merged)
}

fn parse_on_hand(s: &str) -> Result<(RawMaterial, f64), String> {
    let (material, lbs) = split_pair(s)?;
    let lbs = lbs.parse().map_err(|e| format!("bad quantity {lbs}: {e}"))?;
    Ok((parse_material(material)?, lbs))
}

fn parse_order_line(s: &str) -> Result<OrderLine, String> {
    let (product, quantity) = split_pair(s)?;
    let quantity = quantity
        .parse()
        .map_err(|e| format!("bad quantity {quantity}: {e}"))?;
    Ok(OrderLine {
        product: product.to_string(),
        quantity,
    })
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

fn main() -> CliResult {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = config::Config::load_or_default(&cli.config)?;
    let catalog = match &cfg.catalog_path {
        Some(path) => YieldCatalog::load(path)?,
        None => YieldCatalog::builtin(),
    };

    match cli.command {
        Commands::Catalog => print_catalog(&catalog),
        Commands::Convert {
            product,
            quantity,
            cases,
            json,
        } => run_convert(&catalog, &product, quantity, cases, json),
        Commands::Plan {
            cases,
            on_hand,
            json,
        } => run_plan(&catalog, cases, on_hand, json),
        Commands::Order {
            po,
            po_date,
            delivery_date,
            template,
            lines,
            notes,
            csv,
            no_save,
        } => {
            let lines: Vec<OrderLine> = template
                .map(OrderTemplate::lines)
                .unwrap_or_default()
                .into_iter()
                .chain(lines)
                .collect();
            let po_date = po_date.unwrap_or_else(today);
            let delivery_date = delivery_date.unwrap_or(po_date + Duration::days(7));
            let order = NewOrder {
                po,
                po_date,
                delivery_date,
                lines,
                notes,
            };
            let store = if no_save {
                None
            } else {
                Some(RecordStore::new(&cfg.db_path)?)
            };
            run_order(&catalog, order, csv, store.as_ref())
        }
        Commands::Orders { action } => {
            let store = RecordStore::new(&cfg.db_path)?;
            run_orders(&store, action)
        }
        Commands::Purchase {
            material,
            quantity,
            cost,
            invoice,
            date,
        } => {
            let store = RecordStore::new(&cfg.db_path)?;
            let record =
                PurchaseRecord::purchase(material, quantity, cost, date.unwrap_or_else(today), invoice)?;
            let id = store.insert_purchase(&record)?;
            println!(
                "Purchase #{id}: {:.1} lbs {} at ${:.4}/lb",
                record.quantity, record.material, record.price_per_lb
            );
            Ok(())
        }
        Commands::Production {
            po,
            product,
            input_material,
            input_qty,
            output_qty,
        } => {
            let spec = catalog.get(&product)?;
            if spec.raw_material != input_material {
                warn!(
                    product = %product,
                    expected = %spec.raw_material,
                    got = %input_material,
                    "Input material differs from the catalog"
                );
            }
            let store = RecordStore::new(&cfg.db_path)?;
            let record = ProductionRecord::new(po, product, input_material, input_qty, output_qty)?;
            let id = store.record_production(&record, today())?;
            println!(
                "Production #{id}: yield {:.1}% (catalog {:.1}%)",
                record.yield_rate * 100.0,
                spec.yield_rate * 100.0
            );
            Ok(())
        }
        Commands::Scan {
            path,
            save,
            invoice_number,
            date,
            show_text,
        } => {
            let scanned = document::scan_invoice(&path, &cfg.ocr)?;
            if show_text {
                println!("\n--- Extracted Text ---");
                println!("{}", scanned.text);
                println!("--- End ---\n");
            }
            println!("Text source: {:?}", scanned.source);
            println!("{}", serde_json::to_string_pretty(&scanned.invoice)?);
            println!("Invoice total: ${:.2}", scanned.invoice.total_cost());

            if save {
                let store = RecordStore::new(&cfg.db_path)?;
                match save_invoice(&store, &scanned, invoice_number, date)? {
                    Some(saved) => println!(
                        "Saved {saved} of {} line items from {}",
                        scanned.invoice.line_items.len(),
                        scanned.file_name
                    ),
                    None => println!("{} was already imported", scanned.file_name),
                }
            } else {
                println!("\nVerify the proposal above, then re-run with --save to store it.");
            }
            Ok(())
        }
        Commands::Dashboard => {
            let store = RecordStore::new(&cfg.db_path)?;
            print_dashboard(&store)
        }
    }
}

fn print_catalog(catalog: &YieldCatalog) -> CliResult {
    println!(
        "{:<56} {:>6} {:<14} {:>8} {:>6}  Co-products",
        "Product", "Case", "Raw material", "Yield", "Cost"
    );
    for spec in catalog.products() {
        let co: Vec<String> = spec
            .co_products
            .iter()
            .map(|c| format!("{} {:.1}%", c.name, c.yield_rate * 100.0))
            .collect();
        println!(
            "{:<56} {:>6.1} {:<14} {:>7.2}% {:>6.2}  {}",
            spec.name,
            spec.avg_case_weight,
            spec.raw_material.label(),
            spec.yield_rate * 100.0,
            spec.unit_cost,
            co.join(", ")
        );
    }
    println!();
    for material in RawMaterial::ALL {
        if let Some(reference) = catalog.reference_product(material) {
            println!(
                "Reference yield for {:<14} {:.4} ({})",
                material.label(),
                reference.yield_rate,
                reference.name
            );
        }
    }
    Ok(())
}

fn run_convert(catalog: &YieldCatalog, product: &str, quantity: f64, cases: bool, json: bool) -> CliResult {
    let result = if cases {
        conversion::convert_cases(catalog, product, quantity)?
    } else {
        conversion::convert(catalog, product, quantity)?
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", result.product);
    println!("  Finished:     {:>10.2} lbs", result.finished_quantity);
    println!("  Raw material: {:>10.2} lbs {}", result.raw_quantity, result.raw_material);
    println!("  Cost:         {:>10.2} $", result.cost);
    for co in &result.co_products {
        println!("  → {:<11} {:>10.2} lbs", co.product, co.quantity);
    }
    Ok(())
}

fn run_plan(
    catalog: &YieldCatalog,
    cases: Vec<(String, i64)>,
    on_hand: Vec<(RawMaterial, f64)>,
    json: bool,
) -> CliResult {
    let case_orders = merge_case_orders(cases)?;
    let on_hand: HashMap<RawMaterial, f64> = on_hand.into_iter().collect();

    let shortfall = planner::plan(catalog, &case_orders, &on_hand)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&shortfall)?);
        return Ok(());
    }

    // Byproduct preview, in catalog order.
    for spec in catalog.products() {
        let Some(&count) = case_orders.get(&spec.name) else {
            continue;
        };
        if count <= 0 || spec.co_products.is_empty() {
            continue;
        }
        let result = conversion::convert_cases(catalog, &spec.name, count as f64)?;
        println!(
            "From {:.2} lbs of {} input for {} cases of {}, you will get:",
            result.raw_quantity, spec.raw_material, count, spec.name
        );
        for co in &result.co_products {
            println!("  - {:.2} lbs of {}", co.quantity, co.product);
        }
    }

    if shortfall.is_empty() {
        println!("Current inventory is sufficient for this order.");
        return Ok(());
    }
    println!(
        "{:<14} {:>14} {:>16} {:>14} {:>14}",
        "Raw Material", "Required", "On hand (fin.)", "On hand (raw)", "New Order"
    );
    for entry in &shortfall {
        println!(
            "{:<14} {:>14.2} {:>16.2} {:>14.2} {:>14.2}",
            entry.raw_material.label(),
            entry.total_required,
            entry.on_hand_finished,
            entry.on_hand_raw,
            entry.new_order_needed
        );
    }
    Ok(())
}

struct NewOrder {
    po: String,
    po_date: Date,
    delivery_date: Date,
    lines: Vec<OrderLine>,
    notes: Option<String>,
}

fn run_order(
    catalog: &YieldCatalog,
    order: NewOrder,
    csv_path: Option<PathBuf>,
    store: Option<&RecordStore>,
) -> CliResult {
    if order.po.trim().is_empty() {
        return Err("Please enter a PO number".into());
    }
    // Rejects unknown products and negative or non-finite quantities.
    let summary = OrderSummary::build(catalog, &order.lines)?;
    let lines: Vec<OrderLine> = order.lines.into_iter().filter(|l| l.quantity != 0.0).collect();
    if lines.is_empty() {
        return Err("Please add at least one line item".into());
    }

    println!("Order Summary - PO {}", order.po);
    println!(
        "{:<58} {:>20} {:>18} {:>12}",
        "Product", "Order Quantity (lbs)", "Raw Material (lbs)", "Cost"
    );
    for row in summary.summary_rows() {
        println!(
            "{:<58} {:>20} {:>18} {:>12}",
            row.product, row.quantity, row.raw_material, row.cost
        );
    }
    println!("Total Estimated Cost: ${:.2}", summary.total_cost);

    if let Some(path) = csv_path {
        summary.write_csv(std::fs::File::create(&path)?)?;
        info!(path = %path.display(), "Summary written");
    }

    if let Some(store) = store {
        let id = store.insert_order(&StoredOrder {
            id: None,
            po_number: order.po,
            po_date: order.po_date,
            delivery_date: order.delivery_date,
            line_items: lines,
            total_cost: summary.total_cost,
            notes: order.notes.filter(|n| !n.trim().is_empty()),
            status: OrderStatus::Pending,
        })?;
        println!("Order saved as #{id}; see `orders list`.");
    }
    Ok(())
}

fn run_orders(store: &RecordStore, action: OrdersAction) -> CliResult {
    match action {
        OrdersAction::List {
            status,
            all,
            search,
            due,
        } => {
            let statuses = if all {
                Vec::new()
            } else if status.is_empty() {
                vec![OrderStatus::Pending, OrderStatus::InProduction]
            } else {
                status
            };
            let filter = OrderFilter {
                statuses,
                search,
                window: due,
            };

            let now = today();
            let orders = store.list_orders()?;
            let shown = filter.apply(&orders, now);
            if shown.is_empty() {
                println!("No orders found");
                return Ok(());
            }
            for order in shown {
                println!(
                    "#{} {}",
                    order.id.unwrap_or_default(),
                    board::order_header(order, now)
                );
                println!(
                    "    PO date {}  total ${:.2}",
                    order.po_date, order.total_cost
                );
                for line in &order.line_items {
                    println!("    - {}: {:.1} lbs", line.product, line.quantity);
                }
                if let Some(notes) = &order.notes {
                    println!("    Notes: {notes}");
                }
            }
            Ok(())
        }
        OrdersAction::SetStatus { id, status } => {
            store.update_order_status(id, status)?;
            if let Some(order) = store.get_order(id)? {
                println!("#{id} {}", board::order_header(&order, today()));
            }
            Ok(())
        }
    }
}

/// Book a confirmed invoice. Returns the number of purchases written, or
/// `None` when the same file was imported before.
fn save_invoice(
    store: &RecordStore,
    scanned: &document::ScannedInvoice,
    invoice_number: Option<String>,
    date: Option<Date>,
) -> Result<Option<usize>, Box<dyn std::error::Error>> {
    if let Some(existing) = store.get_document(&scanned.uid)? {
        warn!(file = %existing.file_name, "Invoice already imported, skipping");
        return Ok(None);
    }
    let date = date
        .or(scanned.invoice.invoice_date)
        .ok_or("No invoice date found; pass --date to confirm one")?;
    let invoice_number = invoice_number.or_else(|| scanned.invoice.invoice_number.clone());

    let purchases: Vec<PurchaseRecord> = scanned
        .invoice
        .line_items
        .iter()
        .filter_map(|item| {
            PurchaseRecord::from_invoice_item(item, date, invoice_number.clone())
                .inspect_err(|e| {
                    warn!(material = %item.raw_material, error = %e, "Skipping line item")
                })
                .ok()
        })
        .collect();

    let doc = StoredDocument {
        uid: scanned.uid.clone(),
        file_name: scanned.file_name.clone(),
        doc_type: "invoice".to_string(),
        extracted_text: Some(scanned.text.clone()),
    };
    if !store.save_invoice(&doc, &purchases)? {
        return Ok(None);
    }
    Ok(Some(purchases.len()))
}

fn print_dashboard(store: &RecordStore) -> CliResult {
    let levels = store.inventory_levels()?;
    if levels.is_empty() {
        println!("No inventory data available");
    } else {
        let summary = dashboard::inventory_summary(&levels);
        println!("Current Inventory Levels");
        println!("  Total Inventory Value:    ${:.2}", summary.total_value);
        println!("  Total Quantity:           {:.1} lbs", summary.total_quantity);
        println!("  Total Used in Production: {:.1} lbs", summary.total_used);
        println!();
        println!(
            "{:<14} {:>12} {:>12} {:>12} {:>10} {:>12} {:>12}",
            "Material", "Current", "Used", "Purchased", "Price/lb", "Value", "Last Buy"
        );
        for level in &levels {
            let price = level
                .last_purchase_price
                .map(|p| format!("${p:.2}"))
                .unwrap_or_else(|| "N/A".to_string());
            let value = level
                .last_purchase_price
                .map(|p| format!("${:.2}", p * level.current_quantity))
                .unwrap_or_else(|| "N/A".to_string());
            let last = level
                .last_purchase_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<14} {:>12.1} {:>12.1} {:>12.1} {:>10} {:>12} {:>12}",
                level.material.label(),
                level.current_quantity,
                level.used_in_production,
                level.total_purchased,
                price,
                value,
                last
            );
        }

        let recent = store.recent_purchases(10)?;
        if !recent.is_empty() {
            println!("\nRecent Purchases");
            for p in &recent {
                println!(
                    "  {} {:<14} {:>10.1} lbs  ${:.2}/lb  ${:.2}  {}",
                    p.purchase_date,
                    p.material.label(),
                    p.quantity,
                    p.price_per_lb,
                    p.cost,
                    p.invoice_number.as_deref().unwrap_or("-")
                );
            }
        }
    }

    let mut production = store.list_production()?;
    println!();
    if production.is_empty() {
        println!("No production data available");
        return Ok(());
    }
    dashboard::sort_by_po(&mut production);
    let metrics = dashboard::production_metrics(&production);
    println!("Production Metrics ({} runs)", metrics.runs);
    if let Some(avg) = metrics.average_yield {
        println!("  Average Yield:      {:.1}%", avg * 100.0);
    }
    println!("  Total Input (lbs):  {:.0}", metrics.total_input);
    println!("  Total Output (lbs): {:.0}", metrics.total_output);
    println!();
    for run in &production {
        println!(
            "  {:<10} {:<56} {:<14} {:>10.1} {:>10.1} {:>6.1}%",
            run.po_number.as_deref().unwrap_or("-"),
            run.product,
            run.input_material.label(),
            run.input_quantity,
            run.output_quantity,
            run.yield_rate * 100.0
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ScannedInvoice, TextSource};
    use crate::heuristics::{ExtractedInvoice, InvoiceLineItem};
    use time::macros::date;

    #[test]
    fn test_parse_pairs() {
        assert_eq!(
            parse_case_order("WF Kosher Beef Stew=4").unwrap(),
            ("WF Kosher Beef Stew".to_string(), 4)
        );
        assert_eq!(
            parse_on_hand("2pc chuck = 120.5").unwrap(),
            (RawMaterial::TwoPcChuck, 120.5)
        );
        assert!(parse_case_order("WF Kosher Beef Stew").is_err());
        assert!(parse_on_hand("FLANK=3").is_err());
        assert_eq!(parse_order_line("WF Kosher Beef Stew=12.5").unwrap().quantity, 12.5);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2025-03-14").unwrap(),
            date!(2025 - 03 - 14)
        );
        assert!(parse_date("03/14/2025").is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_order_requires_lines() {
        let catalog = YieldCatalog::builtin();
        let order = NewOrder {
            po: "PO-1".to_string(),
            po_date: today(),
            delivery_date: today(),
            lines: vec![OrderLine {
                product: "WF Kosher Beef Stew".to_string(),
                quantity: 0.0,
            }],
            notes: None,
        };
        assert!(run_order(&catalog, order, None, None).is_err());
    }

    const STEW: &str = "WF Kosher Beef Stew";
    const RIBEYE: &str = "WF Kosher Boneless Beef Ribeye Steak";

    fn line(product: &str, quantity: f64) -> OrderLine {
        OrderLine {
            product: product.to_string(),
            quantity,
        }
    }

    fn new_order(lines: Vec<OrderLine>) -> NewOrder {
        NewOrder {
            po: "PO-2".to_string(),
            po_date: today(),
            delivery_date: today(),
            lines,
            notes: None,
        }
    }

    #[test]
    fn test_order_rejects_bad_quantities() {
        let catalog = YieldCatalog::builtin();
        let db = RecordStore::in_memory().unwrap();
        for bad in [-40.0, f64::NAN] {
            let order = new_order(vec![line(STEW, bad), line(RIBEYE, 75.0)]);
            assert!(run_order(&catalog, order, None, Some(&db)).is_err());
        }
        assert!(db.list_orders().unwrap().is_empty());
    }

    #[test]
    fn test_order_drops_zero_lines() {
        let catalog = YieldCatalog::builtin();
        let db = RecordStore::in_memory().unwrap();
        let order = new_order(vec![line(STEW, 0.0), line(RIBEYE, 75.0)]);
        run_order(&catalog, order, None, Some(&db)).unwrap();

        let orders = db.list_orders().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].line_items, vec![line(RIBEYE, 75.0)]);
        assert_eq!(orders[0].status, OrderStatus::Pending);
        assert!((orders[0].total_cost - 158.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_case_orders() {
        let merged = merge_case_orders(vec![
            (STEW.to_string(), 2),
            (RIBEYE.to_string(), 1),
            (STEW.to_string(), 3),
        ])
        .unwrap();
        assert_eq!(merged[STEW], 5);
        assert_eq!(merged[RIBEYE], 1);

        assert!(matches!(
            merge_case_orders(vec![(STEW.to_string(), -5), (STEW.to_string(), 6)]),
            Err(CoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            merge_case_orders(vec![(STEW.to_string(), i64::MAX), (STEW.to_string(), 1)]),
            Err(CoreError::InvalidArgument(_))
        ));
        assert!(parse_case_order("WF Kosher Beef Stew=-5").is_err());
    }

    #[test]
    fn test_plan_rejects_negative_cases() {
        let catalog = YieldCatalog::builtin();
        let cases = vec![(STEW.to_string(), -5), (STEW.to_string(), 6)];
        assert!(run_plan(&catalog, cases, Vec::new(), true).is_err());
        assert!(run_plan(&catalog, vec![(STEW.to_string(), 2)], Vec::new(), true).is_ok());
    }

    fn scanned(uid: &str, invoice_date: Option<Date>, line_items: Vec<InvoiceLineItem>) -> ScannedInvoice {
        ScannedInvoice {
            uid: uid.to_string(),
            file_name: format!("{uid}.txt"),
            text: "Invoice\n104600".to_string(),
            source: TextSource::Plain,
            invoice: ExtractedInvoice {
                invoice_date,
                invoice_number: Some("104600".to_string()),
                line_items,
            },
        }
    }

    fn item(raw_material: RawMaterial, quantity: f64, price_per_lb: f64) -> InvoiceLineItem {
        InvoiceLineItem {
            raw_material,
            quantity,
            price_per_lb,
            total: quantity * price_per_lb,
        }
    }

    #[test]
    fn test_save_invoice_needs_a_date() {
        let db = RecordStore::in_memory().unwrap();
        let invoice = scanned("a1", None, vec![item(RawMaterial::Brisket, 100.0, 3.45)]);

        assert!(save_invoice(&db, &invoice, None, None).is_err());
        assert!(db.inventory_levels().unwrap().is_empty());
        assert!(db.get_document("a1").unwrap().is_none());

        let confirmed = date!(2025 - 03 - 03);
        assert_eq!(save_invoice(&db, &invoice, None, Some(confirmed)).unwrap(), Some(1));
        let purchases = db.recent_purchases(10).unwrap();
        assert_eq!(purchases[0].purchase_date, confirmed);
        assert_eq!(purchases[0].invoice_number.as_deref(), Some("104600"));
    }

    #[test]
    fn test_save_invoice_skips_bad_items_and_repeats() {
        let db = RecordStore::in_memory().unwrap();
        let invoice = scanned(
            "b2",
            Some(date!(2025 - 02 - 28)),
            vec![
                item(RawMaterial::Brisket, 100.0, 3.45),
                item(RawMaterial::Ribeye, 0.0, 9.5),
            ],
        );

        assert_eq!(
            save_invoice(&db, &invoice, Some("OVERRIDE-1".to_string()), None).unwrap(),
            Some(1)
        );
        assert_eq!(save_invoice(&db, &invoice, None, None).unwrap(), None);

        let levels = db.inventory_levels().unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].material, RawMaterial::Brisket);
        assert_eq!(levels[0].total_purchased, 100.0);
        let purchases = db.recent_purchases(10).unwrap();
        assert_eq!(purchases[0].invoice_number.as_deref(), Some("OVERRIDE-1"));
        assert_eq!(purchases[0].purchase_date, date!(2025 - 02 - 28));
    }
}
