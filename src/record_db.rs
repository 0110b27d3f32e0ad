use crate::catalog::RawMaterial;
use crate::conversion::OrderLine;
use crate::error::StoreError;
use crate::heuristics::InvoiceLineItem;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use time::Date;
use time::macros::format_description;
use tracing::info;

pub struct RecordStore {
    conn: Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    InProduction,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::InProduction,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InProduction => "in_production",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled orders are never past due.
    pub fn is_open(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::InProduction)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace([' ', '-'], "_");
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == wanted)
            .ok_or_else(|| StoreError::Invalid(format!("unknown order status: {s}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredOrder {
    pub id: Option<i64>,
    pub po_number: String,
    pub po_date: Date,
    pub delivery_date: Date,
    pub line_items: Vec<OrderLine>,
    pub total_cost: f64,
    pub notes: Option<String>,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Raw material bought in.
    Purchase,
    /// Raw material consumed by production (negative quantity).
    Production,
}

impl TransactionType {
    fn as_str(self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::Production => "production",
        }
    }
}

/// One row of the raw-material ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseRecord {
    pub id: Option<i64>,
    pub material: RawMaterial,
    pub quantity: f64,
    pub cost: f64,
    pub price_per_lb: f64,
    pub purchase_date: Date,
    pub invoice_number: Option<String>,
    pub transaction_type: TransactionType,
}

impl PurchaseRecord {
    /// A purchase of `quantity` lbs for `cost` in total; both must be positive.
    pub fn purchase(
        material: RawMaterial,
        quantity: f64,
        cost: f64,
        purchase_date: Date,
        invoice_number: Option<String>,
    ) -> Result<Self, StoreError> {
        if !(quantity > 0.0 && cost > 0.0) {
            return Err(StoreError::Invalid(
                "quantity and cost must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            id: None,
            material,
            quantity,
            cost,
            price_per_lb: cost / quantity,
            purchase_date,
            invoice_number,
            transaction_type: TransactionType::Purchase,
        })
    }

    /// A confirmed invoice line. The printed price per pound is kept as is.
    pub fn from_invoice_item(
        item: &InvoiceLineItem,
        purchase_date: Date,
        invoice_number: Option<String>,
    ) -> Result<Self, StoreError> {
        let mut record = Self::purchase(
            item.raw_material,
            item.quantity,
            item.total,
            purchase_date,
            invoice_number,
        )?;
        record.price_per_lb = item.price_per_lb;
        Ok(record)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionRecord {
    pub id: Option<i64>,
    pub po_number: Option<String>,
    pub product: String,
    pub input_material: RawMaterial,
    pub input_quantity: f64,
    pub output_quantity: f64,
    /// Measured `output / input`.
    pub yield_rate: f64,
}

impl ProductionRecord {
    pub fn new(
        po_number: Option<String>,
        product: String,
        input_material: RawMaterial,
        input_quantity: f64,
        output_quantity: f64,
    ) -> Result<Self, StoreError> {
        if !(input_quantity > 0.0 && output_quantity > 0.0) {
            return Err(StoreError::Invalid(
                "input and output quantities must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            id: None,
            po_number,
            product,
            input_material,
            input_quantity,
            output_quantity,
            yield_rate: output_quantity / input_quantity,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// SHA-256 of the file contents.
    pub uid: String,
    pub file_name: String,
    pub doc_type: String,
    pub extracted_text: Option<String>,
}

/// Current stock of one raw material, from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryLevel {
    pub material: RawMaterial,
    pub total_purchased: f64,
    pub used_in_production: f64,
    pub current_quantity: f64,
    pub last_purchase_price: Option<f64>,
    pub last_purchase_date: Option<Date>,
}

fn date_to_sql(date: Date) -> String {
    date.to_string()
}

fn date_from_sql(idx: usize, raw: &str) -> rusqlite::Result<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]")).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn material_from_sql(idx: usize, raw: &str) -> rusqlite::Result<RawMaterial> {
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn write_purchase(conn: &Connection, record: &PurchaseRecord) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO inventory_purchases
            (material, quantity, cost, price_per_lb, purchase_date, invoice_number, transaction_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.material.label(),
            record.quantity,
            record.cost,
            record.price_per_lb,
            date_to_sql(record.purchase_date),
            record.invoice_number,
            record.transaction_type.as_str(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(
        purchase_id = id,
        material = %record.material,
        quantity = record.quantity,
        kind = record.transaction_type.as_str(),
        "Ledger entry stored"
    );
    Ok(id)
}

impl RecordStore {
    /// Open (or create) the record store at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(db_path)?)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                po_number TEXT NOT NULL,
                po_date TEXT NOT NULL,
                delivery_date TEXT NOT NULL,
                line_items TEXT NOT NULL,
                total_cost REAL NOT NULL,
                notes TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS inventory_purchases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                material TEXT NOT NULL,
                quantity REAL NOT NULL,
                cost REAL NOT NULL,
                price_per_lb REAL NOT NULL,
                purchase_date TEXT NOT NULL,
                invoice_number TEXT,
                transaction_type TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS production (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                po_number TEXT,
                product TEXT NOT NULL,
                input_material TEXT NOT NULL,
                input_quantity REAL NOT NULL,
                output_quantity REAL NOT NULL,
                yield REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS documents (
                uid TEXT PRIMARY KEY,
                file_name TEXT NOT NULL,
                doc_type TEXT NOT NULL,
                extracted_text TEXT,
                upload_date DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_orders_delivery_date ON orders(delivery_date);
            CREATE INDEX IF NOT EXISTS idx_purchases_material ON inventory_purchases(material);",
        )?;

        info!("Database initialized successfully");
        Ok(Self { conn })
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    pub fn insert_order(&self, order: &StoredOrder) -> Result<i64, StoreError> {
        let line_items = serde_json::to_string(&order.line_items)?;
        self.conn.execute(
            "INSERT INTO orders
                (po_number, po_date, delivery_date, line_items, total_cost, notes, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                order.po_number,
                date_to_sql(order.po_date),
                date_to_sql(order.delivery_date),
                line_items,
                order.total_cost,
                order.notes,
                order.status.as_str(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(order_id = id, po = %order.po_number, "Order stored");
        Ok(id)
    }

    fn row_to_order(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredOrder> {
        let line_items: String = row.get(4)?;
        let status: String = row.get(7)?;
        Ok(StoredOrder {
            id: Some(row.get(0)?),
            po_number: row.get(1)?,
            po_date: date_from_sql(2, &row.get::<_, String>(2)?)?,
            delivery_date: date_from_sql(3, &row.get::<_, String>(3)?)?,
            line_items: serde_json::from_str(&line_items).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
            })?,
            total_cost: row.get(5)?,
            notes: row.get(6)?,
            status: status.parse().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
            })?,
        })
    }

    /// All orders, soonest delivery first.
    pub fn list_orders(&self) -> Result<Vec<StoredOrder>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, po_number, po_date, delivery_date, line_items, total_cost, notes, status
             FROM orders
             ORDER BY delivery_date, id",
        )?;
        let rows = stmt.query_map([], Self::row_to_order)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn get_order(&self, id: i64) -> Result<Option<StoredOrder>, StoreError> {
        let order = self
            .conn
            .query_row(
                "SELECT id, po_number, po_date, delivery_date, line_items, total_cost, notes, status
                 FROM orders
                 WHERE id = ?1",
                params![id],
                Self::row_to_order,
            )
            .optional()?;
        Ok(order)
    }

    pub fn update_order_status(&self, id: i64, status: OrderStatus) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE orders SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::OrderNotFound(id));
        }
        info!(order_id = id, status = %status, "Order status updated");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Raw-material ledger
    // -----------------------------------------------------------------------

    pub fn insert_purchase(&self, record: &PurchaseRecord) -> Result<i64, StoreError> {
        Ok(write_purchase(&self.conn, record)?)
    }

    /// Latest ledger entries first.
    pub fn recent_purchases(&self, limit: usize) -> Result<Vec<PurchaseRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, material, quantity, cost, price_per_lb, purchase_date, invoice_number, transaction_type
             FROM inventory_purchases
             WHERE transaction_type = 'purchase'
             ORDER BY purchase_date DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(PurchaseRecord {
                id: Some(row.get(0)?),
                material: material_from_sql(1, &row.get::<_, String>(1)?)?,
                quantity: row.get(2)?,
                cost: row.get(3)?,
                price_per_lb: row.get(4)?,
                purchase_date: date_from_sql(5, &row.get::<_, String>(5)?)?,
                invoice_number: row.get(6)?,
                transaction_type: TransactionType::Purchase,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Store a production run and book its raw-material consumption.
    pub fn record_production(&self, record: &ProductionRecord, date: Date) -> Result<i64, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO production
                (po_number, product, input_material, input_quantity, output_quantity, yield)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.po_number,
                record.product,
                record.input_material.label(),
                record.input_quantity,
                record.output_quantity,
                record.yield_rate,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO inventory_purchases
                (material, quantity, cost, price_per_lb, purchase_date, invoice_number, transaction_type)
             VALUES (?1, ?2, 0, 0, ?3, NULL, ?4)",
            params![
                record.input_material.label(),
                -record.input_quantity,
                date_to_sql(date),
                TransactionType::Production.as_str(),
            ],
        )?;
        tx.commit()?;

        info!(
            production_id = id,
            product = %record.product,
            yield_rate = format!("{:.4}", record.yield_rate),
            "Production recorded"
        );
        Ok(id)
    }

    pub fn list_production(&self) -> Result<Vec<ProductionRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, po_number, product, input_material, input_quantity, output_quantity, yield
             FROM production
             ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ProductionRecord {
                id: Some(row.get(0)?),
                po_number: row.get(1)?,
                product: row.get(2)?,
                input_material: material_from_sql(3, &row.get::<_, String>(3)?)?,
                input_quantity: row.get(4)?,
                output_quantity: row.get(5)?,
                yield_rate: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Stock per raw material that has any ledger entries, in declaration order.
    pub fn inventory_levels(&self) -> Result<Vec<InventoryLevel>, StoreError> {
        let mut totals = self.conn.prepare(
            "SELECT
                COALESCE(SUM(CASE WHEN transaction_type = 'purchase' THEN quantity ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN transaction_type = 'production' THEN -quantity ELSE 0 END), 0),
                COALESCE(SUM(quantity), 0),
                COUNT(*)
             FROM inventory_purchases
             WHERE material = ?1",
        )?;
        let mut last = self.conn.prepare(
            "SELECT price_per_lb, purchase_date
             FROM inventory_purchases
             WHERE material = ?1 AND transaction_type = 'purchase'
             ORDER BY purchase_date DESC, id DESC
             LIMIT 1",
        )?;

        let mut levels = Vec::new();
        for material in RawMaterial::ALL {
            let (purchased, used, current, entries): (f64, f64, f64, i64) = totals
                .query_row(params![material.label()], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?;
            if entries == 0 {
                continue;
            }

            let latest = last
                .query_row(params![material.label()], |row| {
                    let price: f64 = row.get(0)?;
                    let date = date_from_sql(1, &row.get::<_, String>(1)?)?;
                    Ok((price, date))
                })
                .optional()?;

            levels.push(InventoryLevel {
                material,
                total_purchased: purchased,
                used_in_production: used,
                current_quantity: current,
                last_purchase_price: latest.map(|(price, _)| price),
                last_purchase_date: latest.map(|(_, date)| date),
            });
        }
        Ok(levels)
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    /// Book the purchases of a confirmed invoice together with the document
    /// itself. Returns `false`, writing nothing, when the document was
    /// already imported. Either every row is written or none is.
    pub fn save_invoice(
        &self,
        doc: &StoredDocument,
        purchases: &[PurchaseRecord],
    ) -> Result<bool, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let seen: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE uid = ?1)",
            params![doc.uid],
            |row| row.get(0),
        )?;
        if seen {
            info!(uid = %doc.uid, file = %doc.file_name, "Invoice already imported");
            return Ok(false);
        }

        for record in purchases {
            write_purchase(&tx, record)?;
        }
        tx.execute(
            "INSERT INTO documents (uid, file_name, doc_type, extracted_text)
             VALUES (?1, ?2, ?3, ?4)",
            params![doc.uid, doc.file_name, doc.doc_type, doc.extracted_text],
        )?;
        tx.commit()?;

        info!(
            uid = %doc.uid,
            file = %doc.file_name,
            purchases = purchases.len(),
            "Invoice imported"
        );
        Ok(true)
    }

    pub fn get_document(&self, uid: &str) -> Result<Option<StoredDocument>, StoreError> {
        let doc = self
            .conn
            .query_row(
                "SELECT uid, file_name, doc_type, extracted_text FROM documents WHERE uid = ?1",
                params![uid],
                |row| {
                    Ok(StoredDocument {
                        uid: row.get(0)?,
                        file_name: row.get(1)?,
                        doc_type: row.get(2)?,
                        extracted_text: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(doc)
    }
}
