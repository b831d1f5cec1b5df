//! `gestion tasks ...`

use crate::output::{export, open, print_records, today, ExportArgs};
use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use gestion_core::db::Store;
use gestion_core::model::task::{Task, TaskPriority, TaskStatus};
use gestion_core::repo::task_repo::{SqliteTaskRepository, TaskQuery};
use gestion_core::repo::RepoError;
use gestion_core::service::task_service::TaskService;
use gestion_core::AppConfig;

#[derive(Subcommand, Debug)]
pub enum TasksCommand {
    Add {
        title: String,
        #[arg(long, value_parser = parse_priority, default_value = "normal")]
        priority: TaskPriority,
        #[arg(long)]
        due: Option<NaiveDate>,
        #[arg(long, default_value = "")]
        description: String,
    },
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<TaskPriority>,
        #[arg(long, conflicts_with = "no_due")]
        due: Option<NaiveDate>,
        /// Clear the due date
        #[arg(long)]
        no_due: bool,
        #[arg(long)]
        description: Option<String>,
    },
    Show {
        id: i64,
    },
    Delete {
        id: i64,
    },
    /// Tasks by priority, then due date
    List {
        #[command(flatten)]
        filter: TaskFilter,
    },
    /// todo | in_progress | done | cancelled
    Status {
        id: i64,
        #[arg(value_parser = parse_status)]
        status: TaskStatus,
    },
    /// Open tasks whose due date is past
    Overdue {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Export {
        #[command(flatten)]
        filter: TaskFilter,
        #[command(flatten)]
        output: ExportArgs,
    },
}

#[derive(Args, Debug, Default)]
pub struct TaskFilter {
    #[arg(long, value_parser = parse_status)]
    status: Option<TaskStatus>,
    /// low | normal | high | urgent
    #[arg(long, value_parser = parse_priority)]
    min_priority: Option<TaskPriority>,
    /// Only todo and in-progress tasks
    #[arg(long)]
    open: bool,
}

impl TaskFilter {
    fn into_query(self) -> TaskQuery {
        TaskQuery {
            status: self.status,
            min_priority: self.min_priority,
            only_open: self.open,
            due_before: None,
        }
    }
}

fn parse_priority(text: &str) -> Result<TaskPriority, String> {
    TaskPriority::parse(text).ok_or_else(|| format!("unknown priority `{text}`"))
}

fn parse_status(text: &str) -> Result<TaskStatus, String> {
    TaskStatus::parse(text).ok_or_else(|| format!("unknown task status `{text}`"))
}

pub fn run(config: &AppConfig, command: TasksCommand) -> Result<()> {
    let conn = open(config, Store::Tasks)?;
    let service = TaskService::new(SqliteTaskRepository::try_new(&conn)?);

    match command {
        TasksCommand::Add {
            title,
            priority,
            due,
            description,
        } => {
            let mut task = Task::new(title);
            task.priority = priority;
            task.due_date = due;
            task.description = description;
            let id = service.create_task(&task)?;
            println!("task {id} created");
        }
        TasksCommand::Update {
            id,
            title,
            priority,
            due,
            no_due,
            description,
        } => {
            let mut task = service
                .get_task(id)?
                .ok_or(RepoError::NotFound { entity: "task", id })?;
            if let Some(title) = title {
                task.title = title;
            }
            if let Some(priority) = priority {
                task.priority = priority;
            }
            if due.is_some() || no_due {
                task.due_date = due;
            }
            if let Some(description) = description {
                task.description = description;
            }
            service.update_task(&task)?;
            println!("task {id} updated");
        }
        TasksCommand::Show { id } => {
            let Some(task) = service.get_task(id)? else {
                bail!("task {id} not found");
            };
            println!("id:          {}", task.id.unwrap_or_default());
            println!("title:       {}", task.title);
            println!("priority:    {}", task.priority.as_str());
            println!("status:      {}", task.status.as_str());
            println!(
                "due:         {}",
                task.due_date.map_or_else(|| "-".to_string(), |d| d.to_string())
            );
            if !task.description.is_empty() {
                println!("description: {}", task.description);
            }
        }
        TasksCommand::Delete { id } => {
            service.delete_task(id)?;
            println!("task {id} deleted");
        }
        TasksCommand::List { filter } => {
            let tasks = service.list_tasks(&filter.into_query())?;
            print_records(&tasks);
        }
        TasksCommand::Status { id, status } => {
            service.set_status(id, status)?;
            println!("task {id} is now {}", status.as_str());
        }
        TasksCommand::Overdue { date } => {
            let tasks = service.overdue(date.unwrap_or_else(today))?;
            print_records(&tasks);
        }
        TasksCommand::Export { filter, output } => {
            let tasks = service.list_tasks(&filter.into_query())?;
            export(config, &tasks, &output)?;
        }
    }
    Ok(())
}
