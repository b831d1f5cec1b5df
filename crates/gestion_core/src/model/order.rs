//! Purchase order (Commande) model.
//!
//! # Invariants
//! - `delivered` and `invoiced` both require `ordered`.
//! - When `order_date` is set, its year equals `year`.
//! - Amounts are non-negative cents.

use super::money::{format_cents, Cents};
use super::{require_non_blank, require_non_negative, RecordId, ValidationError};
use crate::export::Tabular;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const MIN_ORDER_YEAR: i32 = 1900;
pub const MAX_ORDER_YEAR: i32 = 2999;

/// Lifecycle position derived from the status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Recorded but not yet sent to the supplier.
    Draft,
    Ordered,
    Delivered,
    /// Supplier invoice received. Wins over `Delivered`.
    Invoiced,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Ordered => "ordered",
            Self::Delivered => "delivered",
            Self::Invoiced => "invoiced",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "ordered" => Some(Self::Ordered),
            "delivered" => Some(Self::Delivered),
            "invoiced" => Some(Self::Invoiced),
            _ => None,
        }
    }
}

/// One purchase order line as tracked by the orders register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// `None` until persisted.
    pub id: Option<RecordId>,
    /// Budget year the order is charged to.
    pub year: i32,
    /// Budget account code.
    pub account: String,
    pub supplier: String,
    pub designation: String,
    pub order_number: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub amount_cents: Cents,
    pub shipping_cents: Cents,
    pub ordered: bool,
    pub delivered: bool,
    pub invoiced: bool,
    pub notes: String,
}

impl Order {
    pub fn new(year: i32, account: impl Into<String>, supplier: impl Into<String>) -> Self {
        Self {
            id: None,
            year,
            account: account.into(),
            supplier: supplier.into(),
            designation: String::new(),
            order_number: None,
            order_date: None,
            amount_cents: 0,
            shipping_cents: 0,
            ordered: false,
            delivered: false,
            invoiced: false,
            notes: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(MIN_ORDER_YEAR..=MAX_ORDER_YEAR).contains(&self.year) {
            return Err(ValidationError::new(
                "year",
                format!(
                    "{} is outside {MIN_ORDER_YEAR}..={MAX_ORDER_YEAR}",
                    self.year
                ),
            ));
        }
        require_non_blank("account", &self.account)?;
        require_non_blank("supplier", &self.supplier)?;
        require_non_negative("amount", self.amount_cents)?;
        require_non_negative("shipping", self.shipping_cents)?;
        if self.delivered && !self.ordered {
            return Err(ValidationError::new(
                "delivered",
                "an order cannot be delivered before it is ordered",
            ));
        }
        if self.invoiced && !self.ordered {
            return Err(ValidationError::new(
                "invoiced",
                "an order cannot be invoiced before it is ordered",
            ));
        }
        if let Some(date) = self.order_date {
            if date.year() != self.year {
                return Err(ValidationError::new(
                    "order_date",
                    format!("{date} is not in year {}", self.year),
                ));
            }
        }
        Ok(())
    }

    pub fn status(&self) -> OrderStatus {
        if self.invoiced {
            OrderStatus::Invoiced
        } else if self.delivered {
            OrderStatus::Delivered
        } else if self.ordered {
            OrderStatus::Ordered
        } else {
            OrderStatus::Draft
        }
    }

    /// Amount plus shipping.
    pub fn total_cents(&self) -> Cents {
        self.amount_cents + self.shipping_cents
    }

    /// Committed spend not yet matched by an invoice.
    pub fn is_outstanding(&self) -> bool {
        self.ordered && !self.invoiced
    }
}

/// Flattened CSV projection of an order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderExportRow {
    pub id: Option<RecordId>,
    pub year: i32,
    pub account: String,
    pub supplier: String,
    pub designation: String,
    pub order_number: String,
    pub order_date: String,
    pub amount: String,
    pub shipping: String,
    pub total: String,
    pub status: &'static str,
    pub notes: String,
}

impl From<&Order> for OrderExportRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            year: order.year,
            account: order.account.clone(),
            supplier: order.supplier.clone(),
            designation: order.designation.clone(),
            order_number: order.order_number.clone().unwrap_or_default(),
            order_date: order.order_date.map(|d| d.to_string()).unwrap_or_default(),
            amount: format_cents(order.amount_cents),
            shipping: format_cents(order.shipping_cents),
            total: format_cents(order.total_cents()),
            status: order.status().as_str(),
            notes: order.notes.clone(),
        }
    }
}

impl Tabular for Order {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "year",
        "account",
        "supplier",
        "designation",
        "order no",
        "total",
        "status",
    ];
    const NUMERIC_COLUMNS: &'static [usize] = &[0, 1, 6];
    type CsvRow = OrderExportRow;

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.map(|id| id.to_string()).unwrap_or_default(),
            self.year.to_string(),
            self.account.clone(),
            self.supplier.clone(),
            self.designation.clone(),
            self.order_number.clone().unwrap_or_default(),
            format_cents(self.total_cents()),
            self.status().as_str().to_string(),
        ]
    }

    fn csv_row(&self) -> OrderExportRow {
        OrderExportRow::from(self)
    }
}

#[cfg(test)]
mod tests {
    use super::{Order, OrderStatus};
    use chrono::NaiveDate;

    fn sample() -> Order {
        let mut order = Order::new(2024, "6063", "ACME");
        order.amount_cents = 10_000;
        order.shipping_cents = 1_250;
        order
    }

    #[test]
    fn status_follows_flags() {
        let mut order = sample();
        assert_eq!(order.status(), OrderStatus::Draft);
        order.ordered = true;
        assert_eq!(order.status(), OrderStatus::Ordered);
        order.invoiced = true;
        assert_eq!(order.status(), OrderStatus::Invoiced);
        order.delivered = true;
        assert_eq!(order.status(), OrderStatus::Invoiced);
    }

    #[test]
    fn total_adds_shipping() {
        assert_eq!(sample().total_cents(), 11_250);
    }

    #[test]
    fn delivered_requires_ordered() {
        let mut order = sample();
        order.delivered = true;
        let err = order.validate().unwrap_err();
        assert_eq!(err.field, "delivered");
    }

    #[test]
    fn order_date_must_match_year() {
        let mut order = sample();
        order.order_date = NaiveDate::from_ymd_opt(2023, 12, 31);
        assert_eq!(order.validate().unwrap_err().field, "order_date");
        order.order_date = NaiveDate::from_ymd_opt(2024, 1, 2);
        order.validate().unwrap();
    }

    #[test]
    fn blank_supplier_is_rejected() {
        let mut order = sample();
        order.supplier = "  ".to_string();
        assert_eq!(order.validate().unwrap_err().field, "supplier");
    }
}
