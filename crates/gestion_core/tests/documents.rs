use gestion_core::db::{open_db_in_memory, Store};
use gestion_core::model::document::{Document, DocumentName};
use gestion_core::repo::document_repo::{
    DocumentPickList, DocumentQuery, DocumentRepository, SqliteDocumentRepository,
};
use gestion_core::service::document_service::DocumentService;
use gestion_core::RepoError;

fn name(subject: &str, version: u32) -> DocumentName {
    DocumentName {
        site: "lyon".to_string(),
        nomenclature: "plan".to_string(),
        issuer: "bet fluides".to_string(),
        subject: subject.to_string(),
        version,
        extension: Some("PDF".to_string()),
    }
}

#[test]
fn stored_document_keeps_the_canonical_name() {
    let conn = open_db_in_memory(Store::Library).unwrap();
    let repo = SqliteDocumentRepository::try_new(&conn).unwrap();

    let mut document = Document::new(2024, "Plans", name("Réseau eau froide", 3));
    document.project = "Rénovation".to_string();
    let id = repo.create_document(&document).unwrap();

    let loaded = repo.get_document(id).unwrap().unwrap();
    assert_eq!(
        loaded.file_name().unwrap(),
        "LYON-PLAN-BET_FLUIDES-Réseau_eau_froide-V03.pdf"
    );
    assert_eq!(loaded.name.issuer, "BET_FLUIDES");

    let by_file = repo
        .get_document_by_file_name("lyon-plan-bet_fluides-réseau_eau_froide-v03.pdf")
        .unwrap();
    assert_eq!(by_file.map(|d| d.id), Some(Some(id)));
}

#[test]
fn same_file_name_twice_is_a_conflict() {
    let conn = open_db_in_memory(Store::Library).unwrap();
    let repo = SqliteDocumentRepository::try_new(&conn).unwrap();

    repo.create_document(&Document::new(2024, "Plans", name("RDC", 1)))
        .unwrap();
    let err = repo
        .create_document(&Document::new(2023, "Archives", name("RDC", 1)))
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));
}

#[test]
fn blank_segment_is_a_validation_error() {
    let conn = open_db_in_memory(Store::Library).unwrap();
    let repo = SqliteDocumentRepository::try_new(&conn).unwrap();

    let err = repo
        .create_document(&Document::new(2024, "Plans", name("  - ", 1)))
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(ref e) if e.field == "name"));
}

#[test]
fn next_version_follows_the_highest_stored_one() {
    let conn = open_db_in_memory(Store::Library).unwrap();
    let service = DocumentService::new(SqliteDocumentRepository::try_new(&conn).unwrap());

    assert_eq!(service.next_version(&name("RDC", 1)).unwrap(), 1);

    service
        .create_document(&Document::new(2024, "Plans", name("RDC", 1)))
        .unwrap();
    service
        .create_document(&Document::new(2024, "Plans", name("RDC", 4)))
        .unwrap();
    service
        .create_document(&Document::new(2024, "Plans", name("R+1", 9)))
        .unwrap();

    // Lowercase input resolves to the same stored segments.
    let mut unversioned = name("RDC", 0);
    unversioned.site = "Lyon".to_string();
    unversioned.extension = None;
    assert_eq!(service.next_version(&unversioned).unwrap(), 5);
}

#[test]
fn new_revision_copies_the_record_with_next_version() {
    let conn = open_db_in_memory(Store::Library).unwrap();
    let service = DocumentService::new(SqliteDocumentRepository::try_new(&conn).unwrap());

    let mut original = Document::new(2024, "Plans", name("RDC", 2));
    original.notes = "indice B".to_string();
    let id = service.create_document(&original).unwrap();

    let revision = service.new_revision(id).unwrap();
    assert_ne!(revision.id, Some(id));
    assert_eq!(revision.name.version, 3);
    assert_eq!(revision.notes, "indice B");
    assert!(revision.file_name().unwrap().ends_with("-V03.pdf"));

    assert!(matches!(
        service.new_revision(999),
        Err(RepoError::NotFound { entity: "document", id: 999 })
    ));
}

#[test]
fn revision_past_the_last_version_is_a_naming_error() {
    let conn = open_db_in_memory(Store::Library).unwrap();
    let service = DocumentService::new(SqliteDocumentRepository::try_new(&conn).unwrap());
    let id = service
        .create_document(&Document::new(2024, "Plans", name("RDC", 9999)))
        .unwrap();

    assert!(matches!(
        service.new_revision(id),
        Err(RepoError::Validation(ref e)) if e.field == "name" && e.message.contains("V10000")
    ));
}

#[test]
fn search_and_pick_lists() {
    let conn = open_db_in_memory(Store::Library).unwrap();
    let repo = SqliteDocumentRepository::try_new(&conn).unwrap();

    let mut plan = Document::new(2024, "Plans", name("RDC", 1));
    plan.project = "Rénovation".to_string();
    repo.create_document(&plan).unwrap();
    repo.create_document(&Document::new(2023, "Contrats", name("Maintenance", 1)))
        .unwrap();
    let mut note = Document::new(2024, "Plans", name("Toiture", 1));
    note.notes = "amiante".to_string();
    repo.create_document(&note).unwrap();

    let plans_2024 = repo
        .search_documents(&DocumentQuery {
            year: Some(2024),
            category: Some("plans".to_string()),
            ..DocumentQuery::default()
        })
        .unwrap();
    assert_eq!(plans_2024.len(), 2);

    let by_notes = repo
        .search_documents(&DocumentQuery {
            text: Some("amiante".to_string()),
            ..DocumentQuery::default()
        })
        .unwrap();
    assert_eq!(by_notes.len(), 1);
    assert_eq!(by_notes[0].name.subject, "Toiture");

    assert_eq!(
        repo.pick_list(DocumentPickList::Categories).unwrap(),
        vec!["Contrats", "Plans"]
    );
    assert_eq!(
        repo.pick_list(DocumentPickList::Projects).unwrap(),
        vec!["Rénovation"]
    );
}
