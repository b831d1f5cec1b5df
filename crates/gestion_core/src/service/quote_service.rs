//! Quote use-case service.
//!
//! # Responsibility
//! - Wrap quote CRUD with logging.
//! - Suggest the next `D<year>-<NNN>` reference.
//! - Summarize acceptance and margins over a quote selection.
//!
//! # Invariants
//! - Margin totals only count accepted quotes.

use crate::model::money::{format_cents, Cents};
use crate::model::quote::Quote;
use crate::model::RecordId;
use crate::repo::quote_repo::{QuoteQuery, QuoteRepository};
use crate::repo::RepoResult;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;

static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^D(\d{4})-(\d+)$").expect("reference regex must compile")
});

/// Acceptance and money totals of a set of quotes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteSummary {
    pub count: u32,
    pub accepted_count: u32,
    pub accepted_purchase_cents: Cents,
    pub accepted_sale_cents: Cents,
}

impl QuoteSummary {
    /// Share of accepted quotes; `None` for an empty selection.
    pub fn acceptance_rate(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(f64::from(self.accepted_count) / f64::from(self.count))
    }

    pub fn accepted_margin_cents(&self) -> Cents {
        self.accepted_sale_cents - self.accepted_purchase_cents
    }

    pub fn render(&self) -> String {
        let rate = self
            .acceptance_rate()
            .map(|rate| format!("{:.1}%", rate * 100.0))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "quotes: {}\naccepted: {} ({rate})\npurchase: {}\nsale: {}\nmargin: {}\n",
            self.count,
            self.accepted_count,
            format_cents(self.accepted_purchase_cents),
            format_cents(self.accepted_sale_cents),
            format_cents(self.accepted_margin_cents()),
        )
    }
}

pub fn summarize_quotes(quotes: &[Quote]) -> QuoteSummary {
    quotes
        .iter()
        .fold(QuoteSummary::default(), |mut summary, quote| {
            summary.count += 1;
            if quote.accepted {
                summary.accepted_count += 1;
                summary.accepted_purchase_cents += quote.purchase_cents;
                summary.accepted_sale_cents += quote.sale_cents;
            }
            summary
        })
}

/// Next free reference for `year` given the references already used.
///
/// References that do not follow the `D<year>-<NNN>` pattern are ignored.
pub fn next_reference<'a>(year: i32, existing: impl IntoIterator<Item = &'a str>) -> String {
    let highest = existing
        .into_iter()
        .filter_map(|reference| REFERENCE_RE.captures(reference.trim()))
        .filter(|caps| caps[1].parse::<i32>().ok() == Some(year))
        .filter_map(|caps| caps[2].parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("D{year:04}-{:03}", highest.saturating_add(1))
}

pub struct QuoteService<R: QuoteRepository> {
    repo: R,
}

impl<R: QuoteRepository> QuoteService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_quote(&self, quote: &Quote) -> RepoResult<RecordId> {
        let id = self.repo.create_quote(quote)?;
        info!("event=quote_create module=quotes status=ok id={id}");
        Ok(id)
    }

    pub fn update_quote(&self, quote: &Quote) -> RepoResult<()> {
        self.repo.update_quote(quote)?;
        info!(
            "event=quote_update module=quotes status=ok id={}",
            quote.id.unwrap_or_default()
        );
        Ok(())
    }

    pub fn get_quote(&self, id: RecordId) -> RepoResult<Option<Quote>> {
        self.repo.get_quote(id)
    }

    pub fn get_quote_by_reference(&self, reference: &str) -> RepoResult<Option<Quote>> {
        self.repo.get_quote_by_reference(reference)
    }

    pub fn delete_quote(&self, id: RecordId) -> RepoResult<()> {
        self.repo.delete_quote(id)?;
        info!("event=quote_delete module=quotes status=ok id={id}");
        Ok(())
    }

    pub fn search_quotes(&self, query: &QuoteQuery) -> RepoResult<Vec<Quote>> {
        self.repo.search_quotes(query)
    }

    pub fn set_accepted(&self, id: RecordId, accepted: bool) -> RepoResult<()> {
        self.repo.set_accepted(id, accepted)?;
        info!("event=quote_accept module=quotes status=ok id={id} accepted={accepted}");
        Ok(())
    }

    pub fn next_reference(&self, year: i32) -> RepoResult<String> {
        let existing = self.repo.references_with_prefix(&format!("D{year:04}-"))?;
        Ok(next_reference(year, existing.iter().map(String::as_str)))
    }

    pub fn summary(&self, query: &QuoteQuery) -> RepoResult<QuoteSummary> {
        let quotes = self.repo.search_quotes(&QuoteQuery {
            limit: None,
            offset: 0,
            ..query.clone()
        })?;
        Ok(summarize_quotes(&quotes))
    }
}

#[cfg(test)]
mod tests {
    use super::{next_reference, summarize_quotes};
    use crate::model::quote::Quote;

    #[test]
    fn next_reference_skips_foreign_patterns_and_years() {
        let existing = ["D2024-007", "d2024-012", "D2023-099", "MISC-1", "D2024-x"];
        assert_eq!(next_reference(2024, existing), "D2024-013");
        assert_eq!(next_reference(2025, existing), "D2025-001");
    }

    #[test]
    fn next_reference_grows_past_three_digits() {
        assert_eq!(next_reference(2024, ["D2024-999"]), "D2024-1000");
    }

    #[test]
    fn summary_counts_margin_of_accepted_quotes_only() {
        let mut accepted = Quote::new("D2024-001", "706");
        accepted.accepted = true;
        accepted.purchase_cents = 6_000;
        accepted.sale_cents = 10_000;
        let mut pending = Quote::new("D2024-002", "706");
        pending.sale_cents = 50_000;

        let summary = summarize_quotes(&[accepted, pending]);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.accepted_count, 1);
        assert_eq!(summary.acceptance_rate(), Some(0.5));
        assert_eq!(summary.accepted_margin_cents(), 4_000);
        assert!(summarize_quotes(&[]).acceptance_rate().is_none());
    }
}
