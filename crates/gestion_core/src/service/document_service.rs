//! Document library use-case service.
//!
//! # Responsibility
//! - Wrap library CRUD with logging.
//! - Issue new revisions under the next free version number.

use crate::model::document::{Document, DocumentName};
use crate::model::RecordId;
use crate::repo::document_repo::{DocumentPickList, DocumentQuery, DocumentRepository};
use crate::repo::{RepoError, RepoResult};
use log::info;

pub struct DocumentService<R: DocumentRepository> {
    repo: R,
}

impl<R: DocumentRepository> DocumentService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_document(&self, document: &Document) -> RepoResult<RecordId> {
        let id = self.repo.create_document(document)?;
        info!("event=document_create module=library status=ok id={id}");
        Ok(id)
    }

    pub fn update_document(&self, document: &Document) -> RepoResult<()> {
        self.repo.update_document(document)?;
        info!(
            "event=document_update module=library status=ok id={}",
            document.id.unwrap_or_default()
        );
        Ok(())
    }

    pub fn get_document(&self, id: RecordId) -> RepoResult<Option<Document>> {
        self.repo.get_document(id)
    }

    pub fn find_by_file_name(&self, file_name: &str) -> RepoResult<Option<Document>> {
        self.repo.get_document_by_file_name(file_name)
    }

    pub fn delete_document(&self, id: RecordId) -> RepoResult<()> {
        self.repo.delete_document(id)?;
        info!("event=document_delete module=library status=ok id={id}");
        Ok(())
    }

    pub fn search_documents(&self, query: &DocumentQuery) -> RepoResult<Vec<Document>> {
        self.repo.search_documents(query)
    }

    pub fn pick_list(&self, list: DocumentPickList) -> RepoResult<Vec<String>> {
        self.repo.pick_list(list)
    }

    /// Version following the highest one stored for the same four segments;
    /// 1 when none is stored.
    pub fn next_version(&self, name: &DocumentName) -> RepoResult<u32> {
        Ok(self
            .repo
            .latest_version(name)?
            .map_or(1, |latest| latest.saturating_add(1)))
    }

    /// Copies document `id` as a new record carrying the next version.
    pub fn new_revision(&self, id: RecordId) -> RepoResult<Document> {
        let source = self.repo.get_document(id)?.ok_or(RepoError::NotFound {
            entity: "document",
            id,
        })?;
        let mut revision = source.clone();
        revision.id = None;
        revision.name.version = self.next_version(&source.name)?;

        let new_id = self.repo.create_document(&revision)?;
        revision.id = Some(new_id);
        info!(
            "event=document_revision module=library status=ok source_id={id} id={new_id} version={}",
            revision.name.version
        );
        Ok(revision)
    }
}
