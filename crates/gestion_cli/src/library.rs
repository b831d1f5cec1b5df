//! `gestion library ...`

use crate::output::{export, open, print_records, ExportArgs};
use anyhow::{bail, Result};
use clap::{Args, Subcommand, ValueEnum};
use gestion_core::db::Store;
use gestion_core::model::document::{format_version, parse_version, Document, DocumentName};
use gestion_core::repo::document_repo::{DocumentPickList, DocumentQuery, SqliteDocumentRepository};
use gestion_core::repo::RepoError;
use gestion_core::service::document_service::DocumentService;
use gestion_core::AppConfig;

#[derive(Subcommand, Debug)]
pub enum LibraryCommand {
    /// Index a document; the version defaults to the next free one
    Add {
        year: i32,
        category: String,
        #[command(flatten)]
        name: NameArgs,
        #[arg(long, default_value = "")]
        project: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Index a document from an existing conforming file name
    Import {
        year: i32,
        category: String,
        file_name: String,
        #[arg(long, default_value = "")]
        project: String,
    },
    /// Build a conforming file name without storing anything
    Name {
        #[command(flatten)]
        name: NameArgs,
    },
    /// Split a file name into its segments
    Parse {
        file_name: String,
    },
    /// Show a document by id or file name
    Show {
        key: String,
    },
    Update {
        id: i64,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    Delete {
        id: i64,
    },
    List {
        #[command(flatten)]
        filter: DocumentFilter,
    },
    /// Store a copy of a document under the next version
    Revise {
        id: i64,
    },
    /// Distinct values for pick lists
    Values {
        #[arg(value_enum)]
        list: PickList,
    },
    Export {
        #[command(flatten)]
        filter: DocumentFilter,
        #[command(flatten)]
        output: ExportArgs,
    },
}

#[derive(Args, Debug)]
pub struct NameArgs {
    #[arg(long)]
    site: String,
    #[arg(long)]
    nomenclature: String,
    #[arg(long)]
    issuer: String,
    #[arg(long)]
    subject: String,
    /// V01, v2 or a bare number
    #[arg(long)]
    version: Option<String>,
    #[arg(long)]
    ext: Option<String>,
}

impl NameArgs {
    fn into_name(self) -> Result<(DocumentName, bool)> {
        let version = match self.version.as_deref() {
            None => None,
            Some(text) => Some(match text.trim().parse::<u32>() {
                Ok(number) => number,
                Err(_) => parse_version(text)?,
            }),
        };
        let name = DocumentName {
            site: self.site,
            nomenclature: self.nomenclature,
            issuer: self.issuer,
            subject: self.subject,
            version: version.unwrap_or(1),
            extension: self.ext,
        };
        Ok((name, version.is_some()))
    }
}

#[derive(Args, Debug, Default)]
pub struct DocumentFilter {
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    project: Option<String>,
    /// File name or notes contain
    #[arg(long)]
    text: Option<String>,
}

impl DocumentFilter {
    fn into_query(self) -> DocumentQuery {
        DocumentQuery {
            year: self.year,
            category: self.category,
            project: self.project,
            text: self.text,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PickList {
    Categories,
    Projects,
}

pub fn run(config: &AppConfig, command: LibraryCommand) -> Result<()> {
    // Pure naming commands never touch the store.
    match command {
        LibraryCommand::Name { name } => {
            let (name, _) = name.into_name()?;
            println!("{}", name.build()?);
            return Ok(());
        }
        LibraryCommand::Parse { file_name } => {
            print_name(&DocumentName::parse(&file_name)?);
            return Ok(());
        }
        command => run_with_store(config, command),
    }
}

fn run_with_store(config: &AppConfig, command: LibraryCommand) -> Result<()> {
    let conn = open(config, Store::Library)?;
    let service = DocumentService::new(SqliteDocumentRepository::try_new(&conn)?);

    match command {
        LibraryCommand::Add {
            year,
            category,
            name,
            project,
            notes,
        } => {
            let (mut name, explicit_version) = name.into_name()?;
            if !explicit_version {
                name.version = service.next_version(&name)?;
            }
            let mut document = Document::new(year, category, name);
            document.project = project;
            document.notes = notes;
            let id = service.create_document(&document)?;
            println!("document {id} indexed as {}", document.file_name()?);
        }
        LibraryCommand::Import {
            year,
            category,
            file_name,
            project,
        } => {
            let mut document = Document::new(year, category, DocumentName::parse(&file_name)?);
            document.project = project;
            let id = service.create_document(&document)?;
            println!("document {id} indexed as {}", document.file_name()?);
        }
        LibraryCommand::Show { key } => {
            let document = match key.parse::<i64>() {
                Ok(id) => service.get_document(id)?,
                Err(_) => service.find_by_file_name(&key)?,
            };
            let Some(document) = document else {
                bail!("document `{key}` not found");
            };
            println!("id:        {}", document.id.unwrap_or_default());
            println!("file name: {}", document.file_name()?);
            println!("year:      {}", document.year);
            println!("category:  {}", document.category);
            println!("project:   {}", document.project);
            print_name(&document.name);
            if !document.notes.is_empty() {
                println!("notes:     {}", document.notes);
            }
        }
        LibraryCommand::Update {
            id,
            year,
            category,
            project,
            notes,
        } => {
            let mut document = service.get_document(id)?.ok_or(RepoError::NotFound {
                entity: "document",
                id,
            })?;
            if let Some(year) = year {
                document.year = year;
            }
            if let Some(category) = category {
                document.category = category;
            }
            if let Some(project) = project {
                document.project = project;
            }
            if let Some(notes) = notes {
                document.notes = notes;
            }
            service.update_document(&document)?;
            println!("document {id} updated");
        }
        LibraryCommand::Delete { id } => {
            service.delete_document(id)?;
            println!("document {id} removed from the library");
        }
        LibraryCommand::List { filter } => {
            let documents = service.search_documents(&filter.into_query())?;
            print_records(&documents);
        }
        LibraryCommand::Revise { id } => {
            let revision = service.new_revision(id)?;
            println!(
                "document {} created as {}",
                revision.id.unwrap_or_default(),
                revision.file_name()?
            );
        }
        LibraryCommand::Values { list } => {
            let list = match list {
                PickList::Categories => DocumentPickList::Categories,
                PickList::Projects => DocumentPickList::Projects,
            };
            for value in service.pick_list(list)? {
                println!("{value}");
            }
        }
        LibraryCommand::Export { filter, output } => {
            let documents = service.search_documents(&filter.into_query())?;
            export(config, &documents, &output)?;
        }
        LibraryCommand::Name { .. } | LibraryCommand::Parse { .. } => {}
    }
    Ok(())
}

fn print_name(name: &DocumentName) {
    println!("site:         {}", name.site);
    println!("nomenclature: {}", name.nomenclature);
    println!("issuer:       {}", name.issuer);
    println!("subject:      {}", name.subject);
    println!("version:      {}", format_version(name.version));
    if let Some(extension) = &name.extension {
        println!("extension:    {extension}");
    }
}
