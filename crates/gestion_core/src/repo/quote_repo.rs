//! Quote repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Duplicate references surface as `RepoError::Conflict`, never as a raw
//!   constraint error.
//! - Search ordering is deterministic: `quote_date DESC, reference ASC`.

use super::{
    bool_to_int, contains_pattern, ensure_store_ready, like_escape, map_unique_violation,
    parse_bool_column, parse_optional_date_column, push_pagination, RepoError, RepoResult,
};
use crate::db::Store;
use crate::model::quote::Quote;
use crate::model::RecordId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const QUOTE_SELECT_SQL: &str = "SELECT
    id,
    reference,
    account,
    client,
    subject,
    quote_date,
    is_accepted,
    purchase_cents,
    sale_cents,
    notes
FROM quotes";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteQuery {
    pub account: Option<String>,
    pub accepted: Option<bool>,
    /// Year of `quote_date`; undated quotes never match.
    pub year: Option<i32>,
    /// Substring of reference, client, subject or notes.
    pub text: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

pub trait QuoteRepository {
    fn create_quote(&self, quote: &Quote) -> RepoResult<RecordId>;
    fn update_quote(&self, quote: &Quote) -> RepoResult<()>;
    fn get_quote(&self, id: RecordId) -> RepoResult<Option<Quote>>;
    fn get_quote_by_reference(&self, reference: &str) -> RepoResult<Option<Quote>>;
    fn delete_quote(&self, id: RecordId) -> RepoResult<()>;
    fn search_quotes(&self, query: &QuoteQuery) -> RepoResult<Vec<Quote>>;
    fn set_accepted(&self, id: RecordId, accepted: bool) -> RepoResult<()>;
    /// References starting with `prefix`, case-insensitive.
    fn references_with_prefix(&self, prefix: &str) -> RepoResult<Vec<String>>;
}

pub struct SqliteQuoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteQuoteRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_store_ready(conn, Store::Quotes)?;
        Ok(Self { conn })
    }
}

impl QuoteRepository for SqliteQuoteRepository<'_> {
    fn create_quote(&self, quote: &Quote) -> RepoResult<RecordId> {
        quote.validate()?;
        let reference = quote.reference.trim();

        self.conn
            .execute(
                "INSERT INTO quotes (
                    reference,
                    account,
                    client,
                    subject,
                    quote_date,
                    is_accepted,
                    purchase_cents,
                    sale_cents,
                    notes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    reference,
                    quote.account.trim(),
                    quote.client.as_str(),
                    quote.subject.as_str(),
                    quote.quote_date.map(|d| d.to_string()),
                    bool_to_int(quote.accepted),
                    quote.purchase_cents,
                    quote.sale_cents,
                    quote.notes.as_str(),
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || format!("quote reference `{reference}` already exists"))
            })?;

        Ok(self.conn.last_insert_rowid())
    }

    fn update_quote(&self, quote: &Quote) -> RepoResult<()> {
        quote.validate()?;
        let id = quote.id.ok_or_else(|| {
            RepoError::InvalidData("cannot update a quote without id".to_string())
        })?;
        let reference = quote.reference.trim();

        let changed = self
            .conn
            .execute(
                "UPDATE quotes
                 SET
                    reference = ?1,
                    account = ?2,
                    client = ?3,
                    subject = ?4,
                    quote_date = ?5,
                    is_accepted = ?6,
                    purchase_cents = ?7,
                    sale_cents = ?8,
                    notes = ?9,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?10;",
                params![
                    reference,
                    quote.account.trim(),
                    quote.client.as_str(),
                    quote.subject.as_str(),
                    quote.quote_date.map(|d| d.to_string()),
                    bool_to_int(quote.accepted),
                    quote.purchase_cents,
                    quote.sale_cents,
                    quote.notes.as_str(),
                    id,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || format!("quote reference `{reference}` already exists"))
            })?;

        if changed == 0 {
            return Err(RepoError::NotFound { entity: "quote", id });
        }
        Ok(())
    }

    fn get_quote(&self, id: RecordId) -> RepoResult<Option<Quote>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{QUOTE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_quote_row(row)?));
        }
        Ok(None)
    }

    fn get_quote_by_reference(&self, reference: &str) -> RepoResult<Option<Quote>> {
        let id: Option<RecordId> = self
            .conn
            .query_row(
                "SELECT id FROM quotes WHERE reference = ?1;",
                [reference.trim()],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.get_quote(id),
            None => Ok(None),
        }
    }

    fn delete_quote(&self, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM quotes WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "quote", id });
        }
        Ok(())
    }

    fn search_quotes(&self, query: &QuoteQuery) -> RepoResult<Vec<Quote>> {
        let mut sql = format!("{QUOTE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(account) = query.account.as_deref().filter(|a| !a.trim().is_empty()) {
            sql.push_str(" AND account = ? COLLATE NOCASE");
            bind_values.push(Value::Text(account.trim().to_string()));
        }
        if let Some(accepted) = query.accepted {
            sql.push_str(" AND is_accepted = ?");
            bind_values.push(Value::Integer(bool_to_int(accepted)));
        }
        if let Some(year) = query.year {
            sql.push_str(" AND substr(quote_date, 1, 4) = ?");
            bind_values.push(Value::Text(format!("{year:04}")));
        }
        if let Some(text) = query.text.as_deref().filter(|t| !t.trim().is_empty()) {
            sql.push_str(
                " AND (reference LIKE ? ESCAPE '\\'
                   OR client LIKE ? ESCAPE '\\'
                   OR subject LIKE ? ESCAPE '\\'
                   OR notes LIKE ? ESCAPE '\\')",
            );
            let pattern = contains_pattern(text);
            for _ in 0..4 {
                bind_values.push(Value::Text(pattern.clone()));
            }
        }

        sql.push_str(" ORDER BY quote_date IS NULL, quote_date DESC, reference ASC");
        push_pagination(&mut sql, &mut bind_values, query.limit, query.offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut quotes = Vec::new();
        while let Some(row) = rows.next()? {
            quotes.push(parse_quote_row(row)?);
        }
        Ok(quotes)
    }

    fn set_accepted(&self, id: RecordId, accepted: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE quotes
             SET
                is_accepted = ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?2;",
            params![bool_to_int(accepted), id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "quote", id });
        }
        Ok(())
    }

    fn references_with_prefix(&self, prefix: &str) -> RepoResult<Vec<String>> {
        let pattern = format!("{}%", like_escape(prefix));
        let mut stmt = self.conn.prepare(
            "SELECT reference FROM quotes
             WHERE reference LIKE ?1 ESCAPE '\\'
             ORDER BY reference ASC;",
        )?;
        let references = stmt
            .query_map([pattern], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(references)
    }
}

fn parse_quote_row(row: &Row<'_>) -> RepoResult<Quote> {
    let quote = Quote {
        id: Some(row.get("id")?),
        reference: row.get("reference")?,
        account: row.get("account")?,
        client: row.get("client")?,
        subject: row.get("subject")?,
        quote_date: parse_optional_date_column(row.get("quote_date")?, "quotes", "quote_date")?,
        accepted: parse_bool_column(row.get("is_accepted")?, "quotes", "is_accepted")?,
        purchase_cents: row.get("purchase_cents")?,
        sale_cents: row.get("sale_cents")?,
        notes: row.get("notes")?,
    };
    quote
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("quotes row failed validation: {err}")))?;
    Ok(quote)
}
