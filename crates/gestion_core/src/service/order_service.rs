//! Purchase order use-case service.
//!
//! # Responsibility
//! - Provide stable CRUD entry points for the orders register.
//! - Build yearly per-account summaries for budget follow-up.

use crate::export::{Alignment, TextTable};
use crate::model::money::{format_cents, Cents};
use crate::model::order::Order;
use crate::model::RecordId;
use crate::repo::order_repo::{AccountTotal, OrderPickList, OrderQuery, OrderRepository};
use crate::repo::{RepoError, RepoResult};
use log::info;

/// Totals of one year, per account and overall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearSummary {
    pub year: i32,
    pub accounts: Vec<AccountTotal>,
}

impl YearSummary {
    pub fn order_count(&self) -> u32 {
        self.accounts.iter().map(|a| a.order_count).sum()
    }

    pub fn total_cents(&self) -> Cents {
        self.accounts.iter().map(|a| a.total_cents).sum()
    }

    pub fn outstanding_cents(&self) -> Cents {
        self.accounts.iter().map(|a| a.outstanding_cents).sum()
    }

    /// Account table followed by a total line.
    pub fn render(&self) -> String {
        let mut table = TextTable::new(
            ["account", "orders", "total", "outstanding"]
                .into_iter()
                .map(str::to_string),
        );
        for column in 1..=3 {
            table.align(column, Alignment::Right);
        }
        for account in &self.accounts {
            table.push_row(vec![
                account.account.clone(),
                account.order_count.to_string(),
                format_cents(account.total_cents),
                format_cents(account.outstanding_cents),
            ]);
        }
        table.push_row(vec![
            format!("TOTAL {}", self.year),
            self.order_count().to_string(),
            format_cents(self.total_cents()),
            format_cents(self.outstanding_cents()),
        ]);
        table.to_string()
    }
}

pub struct OrderService<R: OrderRepository> {
    repo: R,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_order(&self, order: &Order) -> RepoResult<RecordId> {
        let id = self.repo.create_order(order)?;
        info!("event=order_create module=orders status=ok id={id}");
        Ok(id)
    }

    pub fn update_order(&self, order: &Order) -> RepoResult<()> {
        self.repo.update_order(order)?;
        info!(
            "event=order_update module=orders status=ok id={}",
            order.id.unwrap_or_default()
        );
        Ok(())
    }

    pub fn get_order(&self, id: RecordId) -> RepoResult<Option<Order>> {
        self.repo.get_order(id)
    }

    pub fn delete_order(&self, id: RecordId) -> RepoResult<()> {
        self.repo.delete_order(id)?;
        info!("event=order_delete module=orders status=ok id={id}");
        Ok(())
    }

    pub fn search_orders(&self, query: &OrderQuery) -> RepoResult<Vec<Order>> {
        self.repo.search_orders(query)
    }

    /// Applies `change` to a stored order, then validates and saves it.
    pub fn modify_order(
        &self,
        id: RecordId,
        change: impl FnOnce(&mut Order),
    ) -> RepoResult<Order> {
        let mut order = self
            .repo
            .get_order(id)?
            .ok_or(RepoError::NotFound { entity: "order", id })?;
        change(&mut order);
        self.update_order(&order)?;
        Ok(order)
    }

    pub fn year_summary(&self, year: i32) -> RepoResult<YearSummary> {
        let accounts = self.repo.account_totals(year)?;
        Ok(YearSummary { year, accounts })
    }

    pub fn pick_list(&self, list: OrderPickList) -> RepoResult<Vec<String>> {
        self.repo.pick_list(list)
    }
}

#[cfg(test)]
mod tests {
    use super::YearSummary;
    use crate::repo::order_repo::AccountTotal;

    #[test]
    fn summary_totals_sum_accounts() {
        let summary = YearSummary {
            year: 2024,
            accounts: vec![
                AccountTotal {
                    account: "6061".to_string(),
                    order_count: 2,
                    total_cents: 10_050,
                    outstanding_cents: 5_000,
                },
                AccountTotal {
                    account: "6063".to_string(),
                    order_count: 1,
                    total_cents: 950,
                    outstanding_cents: 0,
                },
            ],
        };
        assert_eq!(summary.order_count(), 3);
        assert_eq!(summary.total_cents(), 11_000);
        assert_eq!(summary.outstanding_cents(), 5_000);

        let rendered = summary.render();
        let last = rendered.lines().last().unwrap();
        assert!(last.starts_with("TOTAL 2024"));
        assert!(last.ends_with("50.00"));
    }
}
