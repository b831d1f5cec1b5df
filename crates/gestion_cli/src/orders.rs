//! `gestion orders ...`

use crate::output::{export, open, parse_money, print_records, ExportArgs};
use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};
use gestion_core::db::Store;
use gestion_core::model::money::{format_cents, Cents};
use gestion_core::model::order::{Order, OrderStatus};
use gestion_core::repo::order_repo::{OrderPickList, OrderQuery, SqliteOrderRepository};
use gestion_core::service::order_service::OrderService;
use gestion_core::AppConfig;

#[derive(Subcommand, Debug)]
pub enum OrdersCommand {
    /// Record a new order
    Add {
        year: i32,
        account: String,
        supplier: String,
        #[command(flatten)]
        fields: OrderFields,
    },
    /// Change fields of an existing order
    Update {
        id: i64,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        supplier: Option<String>,
        #[command(flatten)]
        fields: OrderFields,
    },
    Show {
        id: i64,
    },
    Delete {
        id: i64,
    },
    List {
        #[command(flatten)]
        filter: OrderFilter,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Per-account totals for one year
    Summary {
        year: i32,
    },
    /// Distinct values for pick lists
    Values {
        #[arg(value_enum)]
        list: PickList,
    },
    Export {
        #[command(flatten)]
        filter: OrderFilter,
        #[command(flatten)]
        output: ExportArgs,
    },
}

#[derive(Args, Debug, Default)]
pub struct OrderFields {
    #[arg(long)]
    designation: Option<String>,
    #[arg(long)]
    number: Option<String>,
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long, value_parser = parse_money)]
    amount: Option<Cents>,
    #[arg(long, value_parser = parse_money)]
    shipping: Option<Cents>,
    #[arg(long)]
    ordered: Option<bool>,
    #[arg(long)]
    delivered: Option<bool>,
    #[arg(long)]
    invoiced: Option<bool>,
    #[arg(long)]
    notes: Option<String>,
}

impl OrderFields {
    fn apply(self, order: &mut Order) {
        if let Some(designation) = self.designation {
            order.designation = designation;
        }
        if let Some(number) = self.number {
            order.order_number = Some(number).filter(|n| !n.trim().is_empty());
        }
        if let Some(date) = self.date {
            order.order_date = Some(date);
        }
        if let Some(amount) = self.amount {
            order.amount_cents = amount;
        }
        if let Some(shipping) = self.shipping {
            order.shipping_cents = shipping;
        }
        if let Some(ordered) = self.ordered {
            order.ordered = ordered;
        }
        if let Some(delivered) = self.delivered {
            order.delivered = delivered;
        }
        if let Some(invoiced) = self.invoiced {
            order.invoiced = invoiced;
        }
        if let Some(notes) = self.notes {
            order.notes = notes;
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct OrderFilter {
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    account: Option<String>,
    /// Supplier name contains
    #[arg(long)]
    supplier: Option<String>,
    /// Designation, order number or notes contain
    #[arg(long)]
    text: Option<String>,
    /// draft | ordered | delivered | invoiced
    #[arg(long, value_parser = parse_status)]
    status: Option<OrderStatus>,
}

impl OrderFilter {
    fn into_query(self, limit: Option<u32>, offset: u32) -> OrderQuery {
        OrderQuery {
            year: self.year,
            account: self.account,
            supplier: self.supplier,
            text: self.text,
            status: self.status,
            limit,
            offset,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PickList {
    Years,
    Accounts,
    Suppliers,
}

fn parse_status(text: &str) -> Result<OrderStatus, String> {
    OrderStatus::parse(text).ok_or_else(|| format!("unknown order status `{text}`"))
}

pub fn run(config: &AppConfig, command: OrdersCommand) -> Result<()> {
    let conn = open(config, Store::Orders)?;
    let service = OrderService::new(SqliteOrderRepository::try_new(&conn)?);

    match command {
        OrdersCommand::Add {
            year,
            account,
            supplier,
            fields,
        } => {
            let mut order = Order::new(year, account, supplier);
            fields.apply(&mut order);
            let id = service.create_order(&order)?;
            println!("order {id} created");
        }
        OrdersCommand::Update {
            id,
            year,
            account,
            supplier,
            fields,
        } => {
            let order = service.modify_order(id, |order| {
                if let Some(year) = year {
                    order.year = year;
                }
                if let Some(account) = account {
                    order.account = account;
                }
                if let Some(supplier) = supplier {
                    order.supplier = supplier;
                }
                fields.apply(order);
            })?;
            println!("order {id} updated ({})", order.status().as_str());
        }
        OrdersCommand::Show { id } => {
            let Some(order) = service.get_order(id)? else {
                bail!("order {id} not found");
            };
            print_order(&order);
        }
        OrdersCommand::Delete { id } => {
            service.delete_order(id)?;
            println!("order {id} deleted");
        }
        OrdersCommand::List {
            filter,
            limit,
            offset,
        } => {
            let orders = service.search_orders(&filter.into_query(limit, offset))?;
            print_records(&orders);
        }
        OrdersCommand::Summary { year } => {
            print!("{}", service.year_summary(year)?.render());
        }
        OrdersCommand::Values { list } => {
            let list = match list {
                PickList::Years => OrderPickList::Years,
                PickList::Accounts => OrderPickList::Accounts,
                PickList::Suppliers => OrderPickList::Suppliers,
            };
            for value in service.pick_list(list)? {
                println!("{value}");
            }
        }
        OrdersCommand::Export { filter, output } => {
            let orders = service.search_orders(&filter.into_query(None, 0))?;
            export(config, &orders, &output)?;
        }
    }
    Ok(())
}

fn print_order(order: &Order) {
    println!("id:          {}", order.id.unwrap_or_default());
    println!("year:        {}", order.year);
    println!("account:     {}", order.account);
    println!("supplier:    {}", order.supplier);
    println!("designation: {}", order.designation);
    println!(
        "order no:    {}",
        order.order_number.as_deref().unwrap_or("-")
    );
    println!(
        "order date:  {}",
        order
            .order_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("amount:      {}", format_cents(order.amount_cents));
    println!("shipping:    {}", format_cents(order.shipping_cents));
    println!("total:       {}", format_cents(order.total_cents()));
    println!("status:      {}", order.status().as_str());
    if !order.notes.is_empty() {
        println!("notes:       {}", order.notes);
    }
}
