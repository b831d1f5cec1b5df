use chrono::NaiveDate;
use gestion_core::db::{open_db_in_memory, Store};
use gestion_core::model::meter::{Category, Meter, Reading};
use gestion_core::repo::meter_repo::{
    DateRange, MeterQuery, MeterRepository, SqliteMeterRepository,
};
use gestion_core::service::consumption::{Attribution, Granularity, Period};
use gestion_core::service::meter_service::{MeterService, MeterServiceError, ReportGrouping};
use gestion_core::RepoError;
use rusqlite::Connection;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Site {
    water: i64,
    building_a: i64,
    power: i64,
}

fn seed_categories(repo: &SqliteMeterRepository<'_>) -> Site {
    let water = repo.create_category(&Category::new("Eau", None)).unwrap();
    let building_a = repo
        .create_category(&Category::new("Bâtiment A", Some(water)))
        .unwrap();
    let power = repo
        .create_category(&Category::new("Électricité", None))
        .unwrap();
    Site {
        water,
        building_a,
        power,
    }
}

fn read(service: &MeterService<SqliteMeterRepository<'_>>, meter: i64, day: NaiveDate, index: f64) {
    service
        .record_reading(&Reading::new(meter, day, index), false)
        .unwrap();
}

fn open() -> Connection {
    open_db_in_memory(Store::Meters).unwrap()
}

#[test]
fn category_tree_paths_and_subtree_listing() {
    let conn = open();
    let repo = SqliteMeterRepository::try_new(&conn).unwrap();
    let site = seed_categories(&repo);

    assert_eq!(
        repo.category_path(site.building_a).unwrap(),
        vec!["Eau", "Bâtiment A"]
    );

    let tree = repo.category_tree().unwrap();
    assert_eq!(tree.len(), 2);
    assert_eq!(tree[0].category.name, "Eau");
    assert_eq!(tree[0].children[0].category.id, Some(site.building_a));

    let inner = repo
        .create_meter(&Meter::new("EAU-A1", site.building_a, "m3"))
        .unwrap();
    repo.create_meter(&Meter::new("ELEC-1", site.power, "kWh"))
        .unwrap();
    let under_water = repo
        .list_meters(&MeterQuery {
            category_id: Some(site.water),
            include_inactive: false,
        })
        .unwrap();
    assert_eq!(under_water.len(), 1);
    assert_eq!(under_water[0].id, Some(inner));
}

#[test]
fn moving_a_category_below_its_descendant_is_refused() {
    let conn = open();
    let repo = SqliteMeterRepository::try_new(&conn).unwrap();
    let site = seed_categories(&repo);

    let err = repo
        .move_category(site.water, Some(site.building_a))
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));

    repo.move_category(site.building_a, None).unwrap();
    assert_eq!(
        repo.category_path(site.building_a).unwrap(),
        vec!["Bâtiment A"]
    );
}

#[test]
fn non_empty_category_cannot_be_deleted() {
    let conn = open();
    let repo = SqliteMeterRepository::try_new(&conn).unwrap();
    let site = seed_categories(&repo);
    repo.create_meter(&Meter::new("ELEC-1", site.power, "kWh"))
        .unwrap();

    assert!(matches!(
        repo.delete_category(site.water),
        Err(RepoError::Conflict(_))
    ));
    assert!(matches!(
        repo.delete_category(site.power),
        Err(RepoError::Conflict(_))
    ));
    repo.delete_category(site.building_a).unwrap();
}

#[test]
fn deleting_a_meter_removes_its_readings() {
    let conn = open();
    let service = MeterService::new(SqliteMeterRepository::try_new(&conn).unwrap());
    let site = seed_categories(service.repo());
    let meter = service
        .repo()
        .create_meter(&Meter::new("EAU-A1", site.building_a, "m3"))
        .unwrap();
    read(&service, meter, date(2024, 1, 1), 10.0);

    service.repo().delete_meter(meter).unwrap();
    let left: i64 = conn
        .query_row("SELECT COUNT(*) FROM readings;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(left, 0);
}

#[test]
fn reading_checks_previous_and_next_index() {
    let conn = open();
    let service = MeterService::new(SqliteMeterRepository::try_new(&conn).unwrap());
    let site = seed_categories(service.repo());
    let meter = service
        .repo()
        .create_meter(&Meter::new("EAU-A1", site.building_a, "m3"))
        .unwrap();
    read(&service, meter, date(2024, 1, 1), 100.0);
    read(&service, meter, date(2024, 3, 1), 160.0);

    let below = service
        .record_reading(&Reading::new(meter, date(2024, 2, 1), 90.0), false)
        .unwrap_err();
    assert!(matches!(below, MeterServiceError::IndexBelowPrevious { previous, .. } if previous == 100.0));

    let above = service
        .record_reading(&Reading::new(meter, date(2024, 2, 1), 170.0), false)
        .unwrap_err();
    assert!(matches!(above, MeterServiceError::IndexAboveNext { next, .. } if next == 160.0));

    read(&service, meter, date(2024, 2, 1), 130.0);
    let latest = service.repo().latest_reading(meter).unwrap().unwrap();
    assert_eq!(latest.date, date(2024, 3, 1));

    let duplicate = service
        .record_reading(&Reading::new(meter, date(2024, 2, 1), 130.0), false)
        .unwrap_err();
    assert!(matches!(duplicate, MeterServiceError::Repo(RepoError::Conflict(_))));
}

#[test]
fn readings_on_inactive_or_missing_meters_are_refused() {
    let conn = open();
    let service = MeterService::new(SqliteMeterRepository::try_new(&conn).unwrap());
    let site = seed_categories(service.repo());
    let meter = service
        .repo()
        .create_meter(&Meter::new("ELEC-1", site.power, "kWh"))
        .unwrap();
    service.repo().set_meter_active(meter, false).unwrap();

    assert!(matches!(
        service.record_reading(&Reading::new(meter, date(2024, 1, 1), 1.0), false),
        Err(MeterServiceError::MeterInactive(id)) if id == meter
    ));
    assert!(matches!(
        service.record_reading(&Reading::new(999, date(2024, 1, 1), 1.0), false),
        Err(MeterServiceError::MeterNotFound(999))
    ));
}

#[test]
fn corrected_reading_stays_between_its_neighbours() {
    let conn = open();
    let service = MeterService::new(SqliteMeterRepository::try_new(&conn).unwrap());
    let site = seed_categories(service.repo());
    let meter = service
        .repo()
        .create_meter(&Meter::new("EAU-A1", site.building_a, "m3"))
        .unwrap();
    read(&service, meter, date(2024, 1, 1), 100.0);
    let february = service
        .record_reading(&Reading::new(meter, date(2024, 2, 1), 150.0), false)
        .unwrap();
    read(&service, meter, date(2024, 3, 1), 200.0);

    let mut edited = service.repo().get_reading(february).unwrap().unwrap();
    edited.index_value = 500.0;
    assert!(matches!(
        service.update_reading(&edited, false),
        Err(MeterServiceError::IndexAboveNext { next, .. }) if next == 200.0
    ));
    edited.index_value = 90.0;
    assert!(matches!(
        service.update_reading(&edited, false),
        Err(MeterServiceError::IndexBelowPrevious { previous, .. }) if previous == 100.0
    ));

    let intervals = service.consumption(meter, None).unwrap();
    assert!(intervals.iter().all(|interval| !interval.reset));
    assert_eq!(intervals.iter().map(|i| i.consumption).sum::<f64>(), 100.0);

    // Moving the reading later must not compare it with its own old row.
    edited.date = date(2024, 2, 20);
    edited.index_value = 140.0;
    service.update_reading(&edited, false).unwrap();
    let stored = service.repo().get_reading(february).unwrap().unwrap();
    assert_eq!(stored.date, date(2024, 2, 20));
    assert_eq!(stored.index_value, 140.0);

    let mut missing = edited.clone();
    missing.id = Some(999);
    assert!(matches!(
        service.update_reading(&missing, false),
        Err(MeterServiceError::Repo(RepoError::NotFound { entity: "reading", id: 999 }))
    ));
}

#[test]
fn meter_is_found_by_trimmed_name() {
    let conn = open();
    let repo = SqliteMeterRepository::try_new(&conn).unwrap();
    let site = seed_categories(&repo);
    let id = repo
        .create_meter(&Meter::new("EAU-A1", site.building_a, "m3"))
        .unwrap();

    let found = repo.get_meter_by_name(" EAU-A1 ").unwrap().unwrap();
    assert_eq!(found.id, Some(id));
    assert!(repo.get_meter_by_name("EAU-B9").unwrap().is_none());
}

#[test]
fn reset_reading_counts_from_zero() {
    let conn = open();
    let service = MeterService::new(SqliteMeterRepository::try_new(&conn).unwrap());
    let site = seed_categories(service.repo());
    let meter = service
        .repo()
        .create_meter(&Meter::new("ELEC-1", site.power, "kWh"))
        .unwrap();
    read(&service, meter, date(2024, 1, 1), 9_000.0);
    service
        .record_reading(&Reading::new(meter, date(2024, 2, 1), 40.0), true)
        .unwrap();

    let intervals = service.consumption(meter, None).unwrap();
    assert_eq!(intervals.len(), 1);
    assert!(intervals[0].reset);
    assert_eq!(intervals[0].consumption, 40.0);
    assert_eq!(intervals[0].days, 31);
}

#[test]
fn consumption_range_keeps_intervals_ending_inside() {
    let conn = open();
    let service = MeterService::new(SqliteMeterRepository::try_new(&conn).unwrap());
    let site = seed_categories(service.repo());
    let meter = service
        .repo()
        .create_meter(&Meter::new("EAU-A1", site.building_a, "m3"))
        .unwrap();
    read(&service, meter, date(2023, 12, 1), 0.0);
    read(&service, meter, date(2024, 1, 1), 10.0);
    read(&service, meter, date(2024, 2, 1), 25.0);
    read(&service, meter, date(2024, 3, 1), 45.0);

    let from_february = service
        .consumption(meter, DateRange::between(Some(date(2024, 2, 1)), None))
        .unwrap();
    let ends: Vec<NaiveDate> = from_february.iter().map(|i| i.end).collect();
    assert_eq!(ends, vec![date(2024, 2, 1), date(2024, 3, 1)]);

    let listed = service
        .repo()
        .list_readings(meter, DateRange::between(None, Some(date(2024, 1, 1))))
        .unwrap();
    assert_eq!(listed.len(), 2);
}

#[test]
fn monthly_series_by_end_date_and_prorata() {
    let conn = open();
    let service = MeterService::new(SqliteMeterRepository::try_new(&conn).unwrap());
    let site = seed_categories(service.repo());
    let meter = service
        .repo()
        .create_meter(&Meter::new("EAU-A1", site.building_a, "m3"))
        .unwrap();
    read(&service, meter, date(2023, 12, 1), 0.0);
    read(&service, meter, date(2024, 1, 31), 61.0);

    let by_end = service
        .consumption_series(meter, Granularity::Month, Attribution::EndDate)
        .unwrap();
    assert_eq!(by_end.get(&Period::month(2024, 1)), Some(&61.0));
    assert_eq!(by_end.get(&Period::month(2023, 12)), None);

    let spread = service
        .consumption_series(meter, Granularity::Month, Attribution::Prorata)
        .unwrap();
    assert_eq!(spread.get(&Period::month(2023, 12)), Some(&30.0));
    assert_eq!(spread.get(&Period::month(2024, 1)), Some(&31.0));
}

#[test]
fn yearly_comparison_per_meter_and_rolled_up() {
    let conn = open();
    let service = MeterService::new(SqliteMeterRepository::try_new(&conn).unwrap());
    let site = seed_categories(service.repo());
    let repo = service.repo();
    let a1 = repo
        .create_meter(&Meter::new("EAU-A1", site.building_a, "m3"))
        .unwrap();
    let a2 = repo
        .create_meter(&Meter::new("EAU-A2", site.building_a, "m3"))
        .unwrap();
    let direct = repo
        .create_meter(&Meter::new("EAU-GEN", site.water, "m3"))
        .unwrap();
    repo.create_meter(&Meter::new("ELEC-1", site.power, "kWh"))
        .unwrap();

    read(&service, a1, date(2023, 1, 1), 100.0);
    read(&service, a1, date(2023, 12, 31), 200.0);
    read(&service, a1, date(2024, 6, 30), 260.0);
    read(&service, a1, date(2024, 12, 31), 330.0);
    read(&service, a2, date(2023, 6, 1), 0.0);
    read(&service, a2, date(2024, 1, 15), 50.0);
    read(&service, direct, date(2023, 1, 1), 0.0);
    read(&service, direct, date(2023, 7, 1), 20.0);

    let per_meter = service
        .yearly_comparison(2024, Some(site.water), ReportGrouping::PerMeter, Attribution::EndDate)
        .unwrap();
    assert_eq!(per_meter.base_label(), "2023");
    assert_eq!(per_meter.current_label(), "2024");
    let labels: Vec<&str> = per_meter.rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["EAU-A1", "EAU-A2", "EAU-GEN"]);
    assert_eq!(per_meter.rows[0].base, 100.0);
    assert_eq!(per_meter.rows[0].current, 130.0);
    assert_eq!(per_meter.rows[1].percent_change(), None);

    let top_level = service
        .yearly_comparison(2024, None, ReportGrouping::CategoryDepth(1), Attribution::EndDate)
        .unwrap();
    assert_eq!(top_level.rows.len(), 2);
    let water = top_level.rows.iter().find(|r| r.label == "Eau").unwrap();
    assert_eq!(water.base, 120.0);
    assert_eq!(water.current, 180.0);
    assert_eq!(water.percent_change(), Some(50.0));

    let detailed = service
        .yearly_comparison(2024, Some(site.water), ReportGrouping::CategoryDepth(2), Attribution::EndDate)
        .unwrap();
    let labels: Vec<&str> = detailed.rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["Eau", "Eau / Bâtiment A"]);

    assert!(matches!(
        service.yearly_comparison(2024, None, ReportGrouping::CategoryDepth(0), Attribution::EndDate),
        Err(MeterServiceError::Consumption(_))
    ));
}

#[test]
fn replaced_meter_still_counts_in_the_years_it_consumed() {
    let conn = open();
    let service = MeterService::new(SqliteMeterRepository::try_new(&conn).unwrap());
    let site = seed_categories(service.repo());
    let repo = service.repo();
    let replaced = repo
        .create_meter(&Meter::new("EAU-OLD", site.building_a, "m3"))
        .unwrap();
    let retired = repo
        .create_meter(&Meter::new("EAU-2020", site.building_a, "m3"))
        .unwrap();
    read(&service, replaced, date(2023, 1, 1), 0.0);
    read(&service, replaced, date(2023, 12, 31), 100.0);
    read(&service, retired, date(2020, 1, 1), 0.0);
    read(&service, retired, date(2020, 12, 31), 5.0);
    repo.set_meter_active(replaced, false).unwrap();
    repo.set_meter_active(retired, false).unwrap();

    let rolled_up = service
        .yearly_comparison(2024, None, ReportGrouping::CategoryDepth(1), Attribution::EndDate)
        .unwrap();
    assert_eq!(rolled_up.rows.len(), 1);
    assert_eq!(rolled_up.rows[0].label, "Eau");
    assert_eq!(rolled_up.rows[0].base, 100.0);
    assert_eq!(rolled_up.rows[0].current, 0.0);

    let per_meter = service
        .yearly_comparison(2024, None, ReportGrouping::PerMeter, Attribution::EndDate)
        .unwrap();
    let labels: Vec<&str> = per_meter.rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["EAU-OLD"]);
}

#[test]
fn monthly_profile_has_twelve_rows_against_previous_year() {
    let conn = open();
    let service = MeterService::new(SqliteMeterRepository::try_new(&conn).unwrap());
    let site = seed_categories(service.repo());
    let meter = service
        .repo()
        .create_meter(&Meter::new("ELEC-1", site.power, "kWh"))
        .unwrap();
    read(&service, meter, date(2023, 2, 1), 0.0);
    read(&service, meter, date(2023, 3, 1), 40.0);
    read(&service, meter, date(2024, 2, 1), 500.0);
    read(&service, meter, date(2024, 3, 1), 530.0);

    let rows = service
        .monthly_profile(meter, 2024, Attribution::EndDate)
        .unwrap();
    assert_eq!(rows.len(), 12);
    assert_eq!(rows[2].label, "03");
    assert_eq!(rows[2].base, 40.0);
    assert_eq!(rows[2].current, 30.0);
    assert_eq!(rows[2].unit, "kWh");
}
