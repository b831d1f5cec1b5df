//! Purchase order repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and search APIs over the `orders` table.
//! - Aggregate per-account totals for yearly budget follow-up.
//!
//! # Invariants
//! - Write paths call `Order::validate()` before SQL mutations.
//! - Search ordering is deterministic: `year DESC, account ASC, id DESC`.

use super::{
    bool_to_int, contains_pattern, ensure_store_ready, parse_bool_column,
    parse_optional_date_column, push_pagination, RepoError, RepoResult,
};
use crate::db::Store;
use crate::model::money::Cents;
use crate::model::order::{Order, OrderStatus};
use crate::model::RecordId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const ORDER_SELECT_SQL: &str = "SELECT
    id,
    year,
    account,
    supplier,
    designation,
    order_number,
    order_date,
    amount_cents,
    shipping_cents,
    is_ordered,
    is_delivered,
    is_invoiced,
    notes
FROM orders";

/// Search filters for the orders list pane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub year: Option<i32>,
    /// Exact account match.
    pub account: Option<String>,
    /// Case-insensitive substring of the supplier name.
    pub supplier: Option<String>,
    /// Substring of designation, order number or notes.
    pub text: Option<String>,
    pub status: Option<OrderStatus>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Per-account aggregate for one year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountTotal {
    pub account: String,
    pub order_count: u32,
    pub total_cents: Cents,
    /// Ordered but not yet invoiced.
    pub outstanding_cents: Cents,
}

/// Columns offered as pick lists in the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPickList {
    Years,
    Accounts,
    Suppliers,
}

pub trait OrderRepository {
    fn create_order(&self, order: &Order) -> RepoResult<RecordId>;
    fn update_order(&self, order: &Order) -> RepoResult<()>;
    fn get_order(&self, id: RecordId) -> RepoResult<Option<Order>>;
    fn delete_order(&self, id: RecordId) -> RepoResult<()>;
    fn search_orders(&self, query: &OrderQuery) -> RepoResult<Vec<Order>>;
    fn account_totals(&self, year: i32) -> RepoResult<Vec<AccountTotal>>;
    fn pick_list(&self, list: OrderPickList) -> RepoResult<Vec<String>>;
}

/// SQLite-backed order repository.
pub struct SqliteOrderRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrderRepository<'conn> {
    /// Constructs a repository from a connection migrated for `Store::Orders`.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_store_ready(conn, Store::Orders)?;
        Ok(Self { conn })
    }
}

impl OrderRepository for SqliteOrderRepository<'_> {
    fn create_order(&self, order: &Order) -> RepoResult<RecordId> {
        order.validate()?;

        self.conn.execute(
            "INSERT INTO orders (
                year,
                account,
                supplier,
                designation,
                order_number,
                order_date,
                amount_cents,
                shipping_cents,
                is_ordered,
                is_delivered,
                is_invoiced,
                notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                order.year,
                order.account.trim(),
                order.supplier.trim(),
                order.designation.as_str(),
                order.order_number.as_deref(),
                order.order_date.map(|d| d.to_string()),
                order.amount_cents,
                order.shipping_cents,
                bool_to_int(order.ordered),
                bool_to_int(order.delivered),
                bool_to_int(order.invoiced),
                order.notes.as_str(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn update_order(&self, order: &Order) -> RepoResult<()> {
        order.validate()?;
        let id = order.id.ok_or_else(|| {
            RepoError::InvalidData("cannot update an order without id".to_string())
        })?;

        let changed = self.conn.execute(
            "UPDATE orders
             SET
                year = ?1,
                account = ?2,
                supplier = ?3,
                designation = ?4,
                order_number = ?5,
                order_date = ?6,
                amount_cents = ?7,
                shipping_cents = ?8,
                is_ordered = ?9,
                is_delivered = ?10,
                is_invoiced = ?11,
                notes = ?12,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?13;",
            params![
                order.year,
                order.account.trim(),
                order.supplier.trim(),
                order.designation.as_str(),
                order.order_number.as_deref(),
                order.order_date.map(|d| d.to_string()),
                order.amount_cents,
                order.shipping_cents,
                bool_to_int(order.ordered),
                bool_to_int(order.delivered),
                bool_to_int(order.invoiced),
                order.notes.as_str(),
                id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound { entity: "order", id });
        }
        Ok(())
    }

    fn get_order(&self, id: RecordId) -> RepoResult<Option<Order>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ORDER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_order_row(row)?));
        }
        Ok(None)
    }

    fn delete_order(&self, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM orders WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "order", id });
        }
        Ok(())
    }

    fn search_orders(&self, query: &OrderQuery) -> RepoResult<Vec<Order>> {
        let mut sql = format!("{ORDER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(year) = query.year {
            sql.push_str(" AND year = ?");
            bind_values.push(Value::Integer(i64::from(year)));
        }
        if let Some(account) = query.account.as_deref().filter(|a| !a.trim().is_empty()) {
            sql.push_str(" AND account = ? COLLATE NOCASE");
            bind_values.push(Value::Text(account.trim().to_string()));
        }
        if let Some(supplier) = query.supplier.as_deref().filter(|s| !s.trim().is_empty()) {
            sql.push_str(" AND supplier LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(contains_pattern(supplier)));
        }
        if let Some(text) = query.text.as_deref().filter(|t| !t.trim().is_empty()) {
            sql.push_str(
                " AND (designation LIKE ? ESCAPE '\\'
                   OR COALESCE(order_number, '') LIKE ? ESCAPE '\\'
                   OR notes LIKE ? ESCAPE '\\')",
            );
            let pattern = contains_pattern(text);
            for _ in 0..3 {
                bind_values.push(Value::Text(pattern.clone()));
            }
        }
        if let Some(status) = query.status {
            sql.push_str(match status {
                OrderStatus::Draft => " AND is_ordered = 0",
                OrderStatus::Ordered => {
                    " AND is_ordered = 1 AND is_delivered = 0 AND is_invoiced = 0"
                }
                OrderStatus::Delivered => " AND is_delivered = 1 AND is_invoiced = 0",
                OrderStatus::Invoiced => " AND is_invoiced = 1",
            });
        }

        sql.push_str(" ORDER BY year DESC, account ASC, id DESC");
        push_pagination(&mut sql, &mut bind_values, query.limit, query.offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut orders = Vec::new();
        while let Some(row) = rows.next()? {
            orders.push(parse_order_row(row)?);
        }
        Ok(orders)
    }

    fn account_totals(&self, year: i32) -> RepoResult<Vec<AccountTotal>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                account,
                COUNT(*) AS order_count,
                SUM(amount_cents + shipping_cents) AS total_cents,
                SUM(CASE WHEN is_ordered = 1 AND is_invoiced = 0
                    THEN amount_cents + shipping_cents ELSE 0 END) AS outstanding_cents
             FROM orders
             WHERE year = ?1
             GROUP BY account
             ORDER BY account ASC;",
        )?;
        let mut rows = stmt.query([year])?;
        let mut totals = Vec::new();
        while let Some(row) = rows.next()? {
            totals.push(AccountTotal {
                account: row.get("account")?,
                order_count: row.get("order_count")?,
                total_cents: row.get("total_cents")?,
                outstanding_cents: row.get("outstanding_cents")?,
            });
        }
        Ok(totals)
    }

    fn pick_list(&self, list: OrderPickList) -> RepoResult<Vec<String>> {
        let sql = match list {
            OrderPickList::Years => {
                "SELECT CAST(year AS TEXT) FROM orders GROUP BY year ORDER BY year DESC;"
            }
            OrderPickList::Accounts => {
                "SELECT DISTINCT account FROM orders ORDER BY account COLLATE NOCASE ASC;"
            }
            OrderPickList::Suppliers => {
                "SELECT DISTINCT supplier FROM orders ORDER BY supplier COLLATE NOCASE ASC;"
            }
        };
        let mut stmt = self.conn.prepare(sql)?;
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }
}

fn parse_order_row(row: &Row<'_>) -> RepoResult<Order> {
    let order = Order {
        id: Some(row.get("id")?),
        year: row.get("year")?,
        account: row.get("account")?,
        supplier: row.get("supplier")?,
        designation: row.get("designation")?,
        order_number: row.get("order_number")?,
        order_date: parse_optional_date_column(row.get("order_date")?, "orders", "order_date")?,
        amount_cents: row.get("amount_cents")?,
        shipping_cents: row.get("shipping_cents")?,
        ordered: parse_bool_column(row.get("is_ordered")?, "orders", "is_ordered")?,
        delivered: parse_bool_column(row.get("is_delivered")?, "orders", "is_delivered")?,
        invoiced: parse_bool_column(row.get("is_invoiced")?, "orders", "is_invoiced")?,
        notes: row.get("notes")?,
    };
    order
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("orders row failed validation: {err}")))?;
    Ok(order)
}
