//! Task manager use-case service.

use crate::model::task::{Task, TaskStatus};
use crate::model::RecordId;
use crate::repo::task_repo::{TaskQuery, TaskRepository};
use crate::repo::RepoResult;
use chrono::NaiveDate;
use log::info;

pub struct TaskService<R: TaskRepository> {
    repo: R,
}

impl<R: TaskRepository> TaskService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_task(&self, task: &Task) -> RepoResult<RecordId> {
        let id = self.repo.create_task(task)?;
        info!(
            "event=task_create module=tasks status=ok id={id} priority={}",
            task.priority.as_str()
        );
        Ok(id)
    }

    pub fn update_task(&self, task: &Task) -> RepoResult<()> {
        self.repo.update_task(task)?;
        info!(
            "event=task_update module=tasks status=ok id={}",
            task.id.unwrap_or_default()
        );
        Ok(())
    }

    pub fn get_task(&self, id: RecordId) -> RepoResult<Option<Task>> {
        self.repo.get_task(id)
    }

    pub fn delete_task(&self, id: RecordId) -> RepoResult<()> {
        self.repo.delete_task(id)?;
        info!("event=task_delete module=tasks status=ok id={id}");
        Ok(())
    }

    pub fn list_tasks(&self, query: &TaskQuery) -> RepoResult<Vec<Task>> {
        self.repo.list_tasks(query)
    }

    pub fn set_status(&self, id: RecordId, status: TaskStatus) -> RepoResult<()> {
        self.repo.set_status(id, status)?;
        info!(
            "event=task_status module=tasks status=ok id={id} task_status={}",
            status.as_str()
        );
        Ok(())
    }

    /// Open tasks due before `today`, most urgent first.
    pub fn overdue(&self, today: NaiveDate) -> RepoResult<Vec<Task>> {
        let tasks = self.repo.list_tasks(&TaskQuery {
            only_open: true,
            due_before: Some(today),
            ..TaskQuery::default()
        })?;
        Ok(tasks
            .into_iter()
            .filter(|task| task.is_overdue(today))
            .collect())
    }
}
