use chrono::NaiveDate;
use gestion_core::db::{open_db_in_memory, Store};
use gestion_core::model::maintenance::{MaintenanceEntry, Recurrence};
use gestion_core::repo::maintenance_repo::{
    MaintenanceQuery, MaintenanceRepository, SqliteMaintenanceRepository,
};
use gestion_core::service::maintenance_service::MaintenanceService;
use gestion_core::RepoError;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn recurring(title: &str, start: NaiveDate, rule: Recurrence) -> MaintenanceEntry {
    let mut entry = MaintenanceEntry::new(title, start);
    entry.recurrence = Some(rule);
    entry.equipment = "Chaufferie".to_string();
    entry
}

#[test]
fn create_and_get_roundtrip_keeps_rule_and_until() {
    let conn = open_db_in_memory(Store::Maintenance).unwrap();
    let repo = SqliteMaintenanceRepository::try_new(&conn).unwrap();

    let mut entry = recurring("Contrôle chaudière", date(2024, 1, 31), Recurrence::Months(3));
    entry.until = Some(date(2026, 12, 31));
    let id = repo.create_entry(&entry).unwrap();

    let loaded = repo.get_entry(id).unwrap().unwrap();
    assert_eq!(loaded.recurrence, Some(Recurrence::Months(3)));
    assert_eq!(loaded.until, Some(date(2026, 12, 31)));
    assert_eq!(loaded.last_done, None);
    assert!(!loaded.archived);
}

#[test]
fn invalid_rule_is_rejected() {
    let conn = open_db_in_memory(Store::Maintenance).unwrap();
    let repo = SqliteMaintenanceRepository::try_new(&conn).unwrap();

    let entry = recurring("Purge", date(2024, 1, 1), Recurrence::Weeks(0));
    assert!(matches!(
        repo.create_entry(&entry),
        Err(RepoError::Validation(ref e)) if e.field == "recurrence"
    ));
}

#[test]
fn mark_done_moves_next_due_along_the_rule() {
    let conn = open_db_in_memory(Store::Maintenance).unwrap();
    let service = MaintenanceService::new(SqliteMaintenanceRepository::try_new(&conn).unwrap());
    let id = service
        .create_entry(&recurring(
            "Contrôle chaudière",
            date(2024, 1, 31),
            Recurrence::Months(1),
        ))
        .unwrap();
    assert_eq!(service.next_due(id).unwrap(), Some(date(2024, 1, 31)));

    let completion = service
        .mark_done(id, date(2024, 2, 2), "filtre changé")
        .unwrap();
    assert!(!completion.archived);
    assert_eq!(completion.next_due, Some(date(2024, 2, 29)));

    // An older completion never moves `last_done` backwards.
    service.mark_done(id, date(2024, 1, 15), "").unwrap();
    let entry = service.get_entry(id).unwrap().unwrap();
    assert_eq!(entry.last_done, Some(date(2024, 2, 2)));

    let history = service.history(id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].done_on, date(2024, 2, 2));
    assert_eq!(history[0].comment, "filtre changé");
}

#[test]
fn one_off_entry_is_archived_once_done() {
    let conn = open_db_in_memory(Store::Maintenance).unwrap();
    let service = MaintenanceService::new(SqliteMaintenanceRepository::try_new(&conn).unwrap());
    let id = service
        .create_entry(&MaintenanceEntry::new("Remplacer extincteur", date(2024, 5, 1)))
        .unwrap();

    let completion = service.mark_done(id, date(2024, 5, 3), "").unwrap();
    assert!(completion.archived);
    assert_eq!(completion.next_due, None);

    assert!(service
        .search_entries(&MaintenanceQuery::default())
        .unwrap()
        .is_empty());
    let all = service
        .search_entries(&MaintenanceQuery {
            include_archived: true,
            ..MaintenanceQuery::default()
        })
        .unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].archived);
}

#[test]
fn entry_past_its_last_occurrence_is_archived() {
    let conn = open_db_in_memory(Store::Maintenance).unwrap();
    let service = MaintenanceService::new(SqliteMaintenanceRepository::try_new(&conn).unwrap());
    let mut entry = recurring("Relevé légionelle", date(2024, 3, 4), Recurrence::Weeks(1));
    entry.until = Some(date(2024, 3, 18));
    let id = service.create_entry(&entry).unwrap();

    let first = service.mark_done(id, date(2024, 3, 4), "").unwrap();
    assert_eq!(first.next_due, Some(date(2024, 3, 11)));
    let last = service.mark_done(id, date(2024, 3, 18), "").unwrap();
    assert!(last.archived);
}

#[test]
fn overdue_lists_oldest_first_and_excludes_today() {
    let conn = open_db_in_memory(Store::Maintenance).unwrap();
    let service = MaintenanceService::new(SqliteMaintenanceRepository::try_new(&conn).unwrap());

    let monthly = service
        .create_entry(&recurring(
            "Contrôle chaudière",
            date(2024, 1, 31),
            Recurrence::Months(1),
        ))
        .unwrap();
    service.mark_done(monthly, date(2024, 2, 2), "").unwrap();
    let never_done = service
        .create_entry(&MaintenanceEntry::new("Ramonage", date(2024, 3, 15)))
        .unwrap();
    service
        .create_entry(&MaintenanceEntry::new("Audit", date(2024, 4, 1)))
        .unwrap();

    let overdue = service.overdue(date(2024, 4, 1)).unwrap();
    let ids: Vec<(Option<i64>, NaiveDate)> =
        overdue.iter().map(|o| (o.entry.id, o.due)).collect();
    assert_eq!(
        ids,
        vec![
            (Some(monthly), date(2024, 2, 29)),
            (Some(never_done), date(2024, 3, 15)),
        ]
    );
}

#[test]
fn month_calendar_places_occurrences_on_monday_first_grid() {
    let conn = open_db_in_memory(Store::Maintenance).unwrap();
    let service = MaintenanceService::new(SqliteMaintenanceRepository::try_new(&conn).unwrap());
    service
        .create_entry(&recurring(
            "Contrôle chaudière",
            date(2024, 1, 31),
            Recurrence::Months(1),
        ))
        .unwrap();
    let mut weekly = recurring("Relevé légionelle", date(2024, 3, 4), Recurrence::Weeks(1));
    weekly.until = Some(date(2024, 3, 18));
    service.create_entry(&weekly).unwrap();

    let calendar = service.calendar(2024, 3).unwrap();
    assert_eq!(calendar.weeks.len(), 5);
    // March 2024 starts on a Friday.
    assert!(calendar.weeks[0][3].is_none());
    assert_eq!(calendar.weeks[0][4].as_ref().unwrap().date, date(2024, 3, 1));

    let busy: Vec<NaiveDate> = calendar
        .days()
        .filter(|day| !day.items.is_empty())
        .map(|day| day.date)
        .collect();
    assert_eq!(
        busy,
        vec![
            date(2024, 3, 4),
            date(2024, 3, 11),
            date(2024, 3, 18),
            date(2024, 3, 31),
        ]
    );

    let rendered = calendar.render();
    assert!(rendered.starts_with("2024-03\n"));
    assert!(rendered.contains("2024-03-31  Contrôle chaudière"));
}

#[test]
fn mark_done_on_missing_entry_returns_not_found() {
    let conn = open_db_in_memory(Store::Maintenance).unwrap();
    let service = MaintenanceService::new(SqliteMaintenanceRepository::try_new(&conn).unwrap());
    assert!(matches!(
        service.mark_done(3, date(2024, 1, 1), ""),
        Err(RepoError::NotFound { id: 3, .. })
    ));
}
