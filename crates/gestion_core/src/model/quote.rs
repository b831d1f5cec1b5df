//! Quote (Devis) model.
//!
//! # Invariants
//! - `reference` is unique across the store, compared case-insensitively.
//! - Purchase and sale amounts are non-negative cents.

use super::money::{format_cents, Cents};
use super::{require_non_blank, require_non_negative, RecordId, ValidationError};
use crate::export::Tabular;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: Option<RecordId>,
    /// Business reference, e.g. `D2024-007`.
    pub reference: String,
    pub account: String,
    pub client: String,
    pub subject: String,
    pub quote_date: Option<NaiveDate>,
    pub accepted: bool,
    /// What the work costs us.
    pub purchase_cents: Cents,
    /// What the client is charged.
    pub sale_cents: Cents,
    pub notes: String,
}

impl Quote {
    pub fn new(reference: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            id: None,
            reference: reference.into(),
            account: account.into(),
            client: String::new(),
            subject: String::new(),
            quote_date: None,
            accepted: false,
            purchase_cents: 0,
            sale_cents: 0,
            notes: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("reference", &self.reference)?;
        require_non_blank("account", &self.account)?;
        require_non_negative("purchase", self.purchase_cents)?;
        require_non_negative("sale", self.sale_cents)?;
        Ok(())
    }

    pub fn margin_cents(&self) -> Cents {
        self.sale_cents - self.purchase_cents
    }

    /// Margin as a fraction of the sale amount; `None` when nothing is sold.
    pub fn margin_rate(&self) -> Option<f64> {
        if self.sale_cents == 0 {
            return None;
        }
        Some(self.margin_cents() as f64 / self.sale_cents as f64)
    }
}

fn format_rate(rate: Option<f64>) -> String {
    rate.map(|value| format!("{:.1}%", value * 100.0))
        .unwrap_or_else(|| "-".to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteExportRow {
    pub id: Option<RecordId>,
    pub reference: String,
    pub account: String,
    pub client: String,
    pub subject: String,
    pub quote_date: String,
    pub accepted: bool,
    pub purchase: String,
    pub sale: String,
    pub margin: String,
    pub margin_rate: String,
    pub notes: String,
}

impl Tabular for Quote {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "reference",
        "account",
        "client",
        "subject",
        "accepted",
        "purchase",
        "sale",
        "margin",
        "rate",
    ];
    const NUMERIC_COLUMNS: &'static [usize] = &[0, 6, 7, 8, 9];
    type CsvRow = QuoteExportRow;

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.map(|id| id.to_string()).unwrap_or_default(),
            self.reference.clone(),
            self.account.clone(),
            self.client.clone(),
            self.subject.clone(),
            if self.accepted { "yes" } else { "no" }.to_string(),
            format_cents(self.purchase_cents),
            format_cents(self.sale_cents),
            format_cents(self.margin_cents()),
            format_rate(self.margin_rate()),
        ]
    }

    fn csv_row(&self) -> QuoteExportRow {
        QuoteExportRow {
            id: self.id,
            reference: self.reference.clone(),
            account: self.account.clone(),
            client: self.client.clone(),
            subject: self.subject.clone(),
            quote_date: self.quote_date.map(|d| d.to_string()).unwrap_or_default(),
            accepted: self.accepted,
            purchase: format_cents(self.purchase_cents),
            sale: format_cents(self.sale_cents),
            margin: format_cents(self.margin_cents()),
            margin_rate: format_rate(self.margin_rate()),
            notes: self.notes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Quote;

    #[test]
    fn margin_rate_is_none_without_sale() {
        let mut quote = Quote::new("D2024-001", "706");
        quote.purchase_cents = 500;
        assert_eq!(quote.margin_cents(), -500);
        assert_eq!(quote.margin_rate(), None);

        quote.sale_cents = 2_000;
        assert_eq!(quote.margin_cents(), 1_500);
        assert_eq!(quote.margin_rate(), Some(0.75));
    }

    #[test]
    fn negative_amount_is_rejected() {
        let mut quote = Quote::new("D2024-001", "706");
        quote.sale_cents = -1;
        assert_eq!(quote.validate().unwrap_err().field, "sale");
    }
}
