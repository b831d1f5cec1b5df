//! `gestion quotes ...`

use crate::output::{export, open, parse_money, print_records, today, ExportArgs};
use anyhow::{bail, Result};
use chrono::{Datelike, NaiveDate};
use clap::{Args, Subcommand};
use gestion_core::db::Store;
use gestion_core::model::money::{format_cents, Cents};
use gestion_core::model::quote::Quote;
use gestion_core::repo::quote_repo::{QuoteQuery, SqliteQuoteRepository};
use gestion_core::repo::RepoError;
use gestion_core::service::quote_service::QuoteService;
use gestion_core::AppConfig;

#[derive(Subcommand, Debug)]
pub enum QuotesCommand {
    /// Record a new quote
    Add {
        account: String,
        /// Defaults to the next free D<year>-<NNN> reference
        #[arg(long)]
        reference: Option<String>,
        #[command(flatten)]
        fields: QuoteFields,
    },
    Update {
        id: i64,
        #[arg(long)]
        reference: Option<String>,
        #[arg(long)]
        account: Option<String>,
        #[command(flatten)]
        fields: QuoteFields,
    },
    /// Show a quote by id or reference
    Show {
        key: String,
    },
    Delete {
        id: i64,
    },
    List {
        #[command(flatten)]
        filter: QuoteFilter,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Mark a quote accepted (or not, with `--no`)
    Accept {
        id: i64,
        #[arg(long)]
        no: bool,
    },
    /// Suggest the next reference for a year
    NextRef {
        year: Option<i32>,
    },
    /// Acceptance rate and accepted totals
    Summary {
        #[command(flatten)]
        filter: QuoteFilter,
    },
    Export {
        #[command(flatten)]
        filter: QuoteFilter,
        #[command(flatten)]
        output: ExportArgs,
    },
}

#[derive(Args, Debug, Default)]
pub struct QuoteFields {
    #[arg(long)]
    client: Option<String>,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long, value_parser = parse_money)]
    purchase: Option<Cents>,
    #[arg(long, value_parser = parse_money)]
    sale: Option<Cents>,
    #[arg(long)]
    accepted: Option<bool>,
    #[arg(long)]
    notes: Option<String>,
}

impl QuoteFields {
    fn apply(self, quote: &mut Quote) {
        if let Some(client) = self.client {
            quote.client = client;
        }
        if let Some(subject) = self.subject {
            quote.subject = subject;
        }
        if let Some(date) = self.date {
            quote.quote_date = Some(date);
        }
        if let Some(purchase) = self.purchase {
            quote.purchase_cents = purchase;
        }
        if let Some(sale) = self.sale {
            quote.sale_cents = sale;
        }
        if let Some(accepted) = self.accepted {
            quote.accepted = accepted;
        }
        if let Some(notes) = self.notes {
            quote.notes = notes;
        }
    }
}

#[derive(Args, Debug, Default, Clone)]
pub struct QuoteFilter {
    #[arg(long)]
    account: Option<String>,
    #[arg(long)]
    accepted: Option<bool>,
    /// Year of the quote date
    #[arg(long)]
    year: Option<i32>,
    /// Reference, client, subject or notes contain
    #[arg(long)]
    text: Option<String>,
}

impl QuoteFilter {
    fn into_query(self, limit: Option<u32>, offset: u32) -> QuoteQuery {
        QuoteQuery {
            account: self.account,
            accepted: self.accepted,
            year: self.year,
            text: self.text,
            limit,
            offset,
        }
    }
}

pub fn run(config: &AppConfig, command: QuotesCommand) -> Result<()> {
    let conn = open(config, Store::Quotes)?;
    let service = QuoteService::new(SqliteQuoteRepository::try_new(&conn)?);

    match command {
        QuotesCommand::Add {
            account,
            reference,
            fields,
        } => {
            let reference = match reference {
                Some(reference) => reference,
                None => {
                    let year = fields.date.unwrap_or_else(today).year();
                    service.next_reference(year)?
                }
            };
            let mut quote = Quote::new(reference, account);
            fields.apply(&mut quote);
            let id = service.create_quote(&quote)?;
            println!("quote {id} created as {}", quote.reference);
        }
        QuotesCommand::Update {
            id,
            reference,
            account,
            fields,
        } => {
            let mut quote = service
                .get_quote(id)?
                .ok_or(RepoError::NotFound { entity: "quote", id })?;
            if let Some(reference) = reference {
                quote.reference = reference;
            }
            if let Some(account) = account {
                quote.account = account;
            }
            fields.apply(&mut quote);
            service.update_quote(&quote)?;
            println!("quote {id} updated");
        }
        QuotesCommand::Show { key } => {
            let quote = match key.parse::<i64>() {
                Ok(id) => service.get_quote(id)?,
                Err(_) => service.get_quote_by_reference(&key)?,
            };
            let Some(quote) = quote else {
                bail!("quote `{key}` not found");
            };
            print_quote(&quote);
        }
        QuotesCommand::Delete { id } => {
            service.delete_quote(id)?;
            println!("quote {id} deleted");
        }
        QuotesCommand::List {
            filter,
            limit,
            offset,
        } => {
            let quotes = service.search_quotes(&filter.into_query(limit, offset))?;
            print_records(&quotes);
        }
        QuotesCommand::Accept { id, no } => {
            service.set_accepted(id, !no)?;
            println!(
                "quote {id} marked {}",
                if no { "not accepted" } else { "accepted" }
            );
        }
        QuotesCommand::NextRef { year } => {
            let year = year.unwrap_or_else(|| today().year());
            println!("{}", service.next_reference(year)?);
        }
        QuotesCommand::Summary { filter } => {
            let summary = service.summary(&filter.into_query(None, 0))?;
            print!("{}", summary.render());
        }
        QuotesCommand::Export { filter, output } => {
            let quotes = service.search_quotes(&filter.into_query(None, 0))?;
            export(config, &quotes, &output)?;
        }
    }
    Ok(())
}

fn print_quote(quote: &Quote) {
    println!("id:        {}", quote.id.unwrap_or_default());
    println!("reference: {}", quote.reference);
    println!("account:   {}", quote.account);
    println!("client:    {}", quote.client);
    println!("subject:   {}", quote.subject);
    println!(
        "date:      {}",
        quote
            .quote_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("accepted:  {}", if quote.accepted { "yes" } else { "no" });
    println!("purchase:  {}", format_cents(quote.purchase_cents));
    println!("sale:      {}", format_cents(quote.sale_cents));
    println!(
        "margin:    {}{}",
        format_cents(quote.margin_cents()),
        quote
            .margin_rate()
            .map(|rate| format!(" ({:.1}%)", rate * 100.0))
            .unwrap_or_default()
    );
    if !quote.notes.is_empty() {
        println!("notes:     {}", quote.notes);
    }
}
