use chrono::NaiveDate;
use gestion_core::db::{open_db_in_memory, Store};
use gestion_core::model::task::{Task, TaskPriority, TaskStatus};
use gestion_core::repo::task_repo::{SqliteTaskRepository, TaskQuery, TaskRepository};
use gestion_core::service::task_service::TaskService;
use gestion_core::RepoError;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn task(title: &str, priority: TaskPriority, due: Option<NaiveDate>) -> Task {
    let mut task = Task::new(title);
    task.priority = priority;
    task.due_date = due;
    task
}

#[test]
fn list_orders_by_priority_then_due_date() {
    let conn = open_db_in_memory(Store::Tasks).unwrap();
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();

    repo.create_task(&task("undated", TaskPriority::High, None))
        .unwrap();
    repo.create_task(&task("later", TaskPriority::High, Some(date(2024, 9, 1))))
        .unwrap();
    repo.create_task(&task("sooner", TaskPriority::High, Some(date(2024, 6, 1))))
        .unwrap();
    repo.create_task(&task("fire", TaskPriority::Urgent, None))
        .unwrap();
    repo.create_task(&task("someday", TaskPriority::Low, Some(date(2024, 1, 1))))
        .unwrap();

    let titles: Vec<String> = repo
        .list_tasks(&TaskQuery::default())
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(titles, vec!["fire", "sooner", "later", "undated", "someday"]);

    let important = repo
        .list_tasks(&TaskQuery {
            min_priority: Some(TaskPriority::High),
            ..TaskQuery::default()
        })
        .unwrap();
    assert_eq!(important.len(), 4);
}

#[test]
fn completed_at_follows_done_status() {
    let conn = open_db_in_memory(Store::Tasks).unwrap();
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let id = repo
        .create_task(&task("Relancer fournisseur", TaskPriority::Normal, None))
        .unwrap();

    let created = repo.get_task(id).unwrap().unwrap();
    assert!(created.created_at.is_some());
    assert_eq!(created.completed_at, None);

    repo.set_status(id, TaskStatus::Done).unwrap();
    let done = repo.get_task(id).unwrap().unwrap();
    let stamp = done.completed_at.expect("done task carries a completion stamp");

    // Saving other fields keeps the original stamp.
    let mut edited = done.clone();
    edited.title = "Relancer fournisseur (fait)".to_string();
    repo.update_task(&edited).unwrap();
    assert_eq!(repo.get_task(id).unwrap().unwrap().completed_at, Some(stamp));

    repo.set_status(id, TaskStatus::InProgress).unwrap();
    assert_eq!(repo.get_task(id).unwrap().unwrap().completed_at, None);
}

#[test]
fn task_created_done_is_stamped() {
    let conn = open_db_in_memory(Store::Tasks).unwrap();
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let mut finished = Task::new("Archiver devis 2023");
    finished.status = TaskStatus::Done;
    let id = repo.create_task(&finished).unwrap();
    assert!(repo.get_task(id).unwrap().unwrap().completed_at.is_some());
}

#[test]
fn overdue_only_returns_open_tasks_due_before_today() {
    let conn = open_db_in_memory(Store::Tasks).unwrap();
    let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());

    let late = service
        .create_task(&task("late", TaskPriority::Normal, Some(date(2024, 3, 1))))
        .unwrap();
    let closed = service
        .create_task(&task("closed", TaskPriority::Urgent, Some(date(2024, 2, 1))))
        .unwrap();
    service.set_status(closed, TaskStatus::Cancelled).unwrap();
    service
        .create_task(&task("today", TaskPriority::High, Some(date(2024, 3, 10))))
        .unwrap();
    service
        .create_task(&task("undated", TaskPriority::Urgent, None))
        .unwrap();

    let overdue = service.overdue(date(2024, 3, 10)).unwrap();
    let ids: Vec<Option<i64>> = overdue.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![Some(late)]);
}

#[test]
fn blank_title_and_missing_ids_are_reported() {
    let conn = open_db_in_memory(Store::Tasks).unwrap();
    let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());

    assert!(matches!(
        service.create_task(&Task::new("   ")),
        Err(RepoError::Validation(ref e)) if e.field == "title"
    ));
    assert!(matches!(
        service.set_status(5, TaskStatus::Done),
        Err(RepoError::NotFound { entity: "task", id: 5 })
    ));
    assert!(matches!(
        service.delete_task(5),
        Err(RepoError::NotFound { .. })
    ));
}
