//! Document library repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `file_name` is always the canonical name built from the stored segments.
//! - File names are unique, compared case-insensitively.

use super::{
    contains_pattern, ensure_store_ready, map_unique_violation, RepoError, RepoResult,
};
use crate::db::Store;
use crate::model::document::{Document, DocumentName};
use crate::model::RecordId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const DOCUMENT_SELECT_SQL: &str = "SELECT
    id,
    year,
    category,
    project,
    site,
    nomenclature,
    issuer,
    subject,
    version,
    extension,
    file_name,
    notes
FROM documents";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    pub year: Option<i32>,
    pub category: Option<String>,
    pub project: Option<String>,
    /// Substring of file name or notes.
    pub text: Option<String>,
}

/// Index columns offered as pick lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentPickList {
    Categories,
    Projects,
}

pub trait DocumentRepository {
    fn create_document(&self, document: &Document) -> RepoResult<RecordId>;
    fn update_document(&self, document: &Document) -> RepoResult<()>;
    fn get_document(&self, id: RecordId) -> RepoResult<Option<Document>>;
    fn get_document_by_file_name(&self, file_name: &str) -> RepoResult<Option<Document>>;
    fn delete_document(&self, id: RecordId) -> RepoResult<()>;
    fn search_documents(&self, query: &DocumentQuery) -> RepoResult<Vec<Document>>;
    fn pick_list(&self, list: DocumentPickList) -> RepoResult<Vec<String>>;
    /// Highest stored version sharing the four naming segments of `name`.
    fn latest_version(&self, name: &DocumentName) -> RepoResult<Option<u32>>;
}

pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_store_ready(conn, Store::Library)?;
        Ok(Self { conn })
    }
}

/// Sanitized naming segments as stored, read back from the built file name.
fn stored_name(document: &Document) -> RepoResult<(String, DocumentName)> {
    let file_name = document
        .file_name()
        .map_err(|err| RepoError::InvalidData(err.to_string()))?;
    let canonical = DocumentName::parse(&file_name)
        .map_err(|err| RepoError::InvalidData(err.to_string()))?;
    Ok((file_name, canonical))
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn create_document(&self, document: &Document) -> RepoResult<RecordId> {
        document.validate()?;
        let (file_name, name) = stored_name(document)?;
        self.conn
            .execute(
                "INSERT INTO documents (
                    year,
                    category,
                    project,
                    site,
                    nomenclature,
                    issuer,
                    subject,
                    version,
                    extension,
                    file_name,
                    notes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
                params![
                    document.year,
                    document.category.trim(),
                    document.project.trim(),
                    name.site,
                    name.nomenclature,
                    name.issuer,
                    name.subject,
                    name.version,
                    name.extension,
                    file_name,
                    document.notes.as_str(),
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || format!("document `{file_name}` already exists"))
            })?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_document(&self, document: &Document) -> RepoResult<()> {
        document.validate()?;
        let id = document.id.ok_or_else(|| {
            RepoError::InvalidData("cannot update a document without id".to_string())
        })?;
        let (file_name, name) = stored_name(document)?;
        let changed = self
            .conn
            .execute(
                "UPDATE documents
                 SET
                    year = ?1,
                    category = ?2,
                    project = ?3,
                    site = ?4,
                    nomenclature = ?5,
                    issuer = ?6,
                    subject = ?7,
                    version = ?8,
                    extension = ?9,
                    file_name = ?10,
                    notes = ?11,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?12;",
                params![
                    document.year,
                    document.category.trim(),
                    document.project.trim(),
                    name.site,
                    name.nomenclature,
                    name.issuer,
                    name.subject,
                    name.version,
                    name.extension,
                    file_name,
                    document.notes.as_str(),
                    id,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || format!("document `{file_name}` already exists"))
            })?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "document",
                id,
            });
        }
        Ok(())
    }

    fn get_document(&self, id: RecordId) -> RepoResult<Option<Document>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DOCUMENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_document_row(row)?));
        }
        Ok(None)
    }

    fn get_document_by_file_name(&self, file_name: &str) -> RepoResult<Option<Document>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DOCUMENT_SELECT_SQL} WHERE file_name = ?1;"))?;
        let mut rows = stmt.query([file_name.trim()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_document_row(row)?));
        }
        Ok(None)
    }

    fn delete_document(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "document",
                id,
            });
        }
        Ok(())
    }

    fn search_documents(&self, query: &DocumentQuery) -> RepoResult<Vec<Document>> {
        let mut sql = format!("{DOCUMENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(year) = query.year {
            sql.push_str(" AND year = ?");
            bind_values.push(Value::Integer(i64::from(year)));
        }
        if let Some(category) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
            sql.push_str(" AND category = ? COLLATE NOCASE");
            bind_values.push(Value::Text(category.trim().to_string()));
        }
        if let Some(project) = query.project.as_deref().filter(|p| !p.trim().is_empty()) {
            sql.push_str(" AND project = ? COLLATE NOCASE");
            bind_values.push(Value::Text(project.trim().to_string()));
        }
        if let Some(text) = query.text.as_deref().filter(|t| !t.trim().is_empty()) {
            sql.push_str(" AND (file_name LIKE ? ESCAPE '\\' OR notes LIKE ? ESCAPE '\\')");
            let pattern = contains_pattern(text);
            bind_values.push(Value::Text(pattern.clone()));
            bind_values.push(Value::Text(pattern));
        }
        sql.push_str(" ORDER BY year DESC, category ASC, file_name ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(parse_document_row(row)?);
        }
        Ok(documents)
    }

    fn pick_list(&self, list: DocumentPickList) -> RepoResult<Vec<String>> {
        let sql = match list {
            DocumentPickList::Categories => {
                "SELECT DISTINCT category FROM documents ORDER BY category COLLATE NOCASE ASC;"
            }
            DocumentPickList::Projects => {
                "SELECT DISTINCT project FROM documents
                 WHERE project <> ''
                 ORDER BY project COLLATE NOCASE ASC;"
            }
        };
        let mut stmt = self.conn.prepare(sql)?;
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    fn latest_version(&self, name: &DocumentName) -> RepoResult<Option<u32>> {
        let base = DocumentName {
            version: 0,
            extension: None,
            ..name.clone()
        };
        let canonical = base
            .build()
            .and_then(|built| DocumentName::parse(&built))
            .map_err(|err| RepoError::InvalidData(err.to_string()))?;
        let version: Option<u32> = self.conn.query_row(
            "SELECT MAX(version) FROM documents
             WHERE site = ?1 AND nomenclature = ?2 AND issuer = ?3
               AND subject = ?4 COLLATE NOCASE;",
            params![
                canonical.site,
                canonical.nomenclature,
                canonical.issuer,
                canonical.subject
            ],
            |row| row.get(0),
        )?;
        Ok(version)
    }
}

fn parse_document_row(row: &Row<'_>) -> RepoResult<Document> {
    let name = DocumentName {
        site: row.get("site")?,
        nomenclature: row.get("nomenclature")?,
        issuer: row.get("issuer")?,
        subject: row.get("subject")?,
        version: row.get("version")?,
        extension: row.get("extension")?,
    };
    let stored_file_name: String = row.get("file_name")?;
    let document = Document {
        id: Some(row.get("id")?),
        year: row.get("year")?,
        category: row.get("category")?,
        project: row.get("project")?,
        name,
        notes: row.get("notes")?,
    };
    let built = document
        .file_name()
        .map_err(|err| RepoError::InvalidData(format!("documents row has invalid name: {err}")))?;
    if built != stored_file_name {
        return Err(RepoError::InvalidData(format!(
            "documents.file_name `{stored_file_name}` does not match its segments (`{built}`)"
        )));
    }
    Ok(document)
}
