//! Repository tests against a live PostgreSQL server.
//!
//! Set `TEST_DATABASE_URL` to run them. Each test migrates a fresh schema
//! and drops it when done. Without the variable the tests are skipped.

use std::str::FromStr;

use chrono::NaiveDate;
use sqlx::postgres::PgConnectOptions;

use super::*;
use crate::domain::Role;

const TRANSIT_FIXTURE: &str = "
    INSERT INTO stops (id, name, latitude, longitude, description) VALUES
        ('P1', 'Praça', -23.55, -46.63, 'Praça stop'),
        ('P2', 'Estação', -23.54, -46.63, NULL),
        ('P3', 'Terminal', -23.53, -46.63, NULL);
    INSERT INTO onibus (id, nome, codigo) VALUES
        ('B2', 'Line 200', '200'),
        ('B1', 'Line 100', '100');
    INSERT INTO stop_times (onibus_id, stop_id, departure_time, stop_sequence) VALUES
        ('B1', 'P1', '08:00', 1),
        ('B1', 'P2', '08:10', 2),
        ('B1', 'P3', '08:20', 3),
        ('B1', 'P1', '09:00', 4),
        ('B2', 'P1', '07:30', 1),
        ('B1', 'P1', '07:00', 1);
";

struct TestDb {
    store: PgStore,
    pool: PgPool,
    schema: String,
}

impl TestDb {
    async fn connect() -> Option<Self> {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("SKIP-TEST-DATABASE: TEST_DATABASE_URL is not set");
            return None;
        };

        let schema = format!("bustrack_test_{}", Uuid::new_v4().simple());
        let admin = PgPool::connect(&url).await.unwrap();
        sqlx::query(&format!("CREATE SCHEMA {schema}"))
            .execute(&admin)
            .await
            .unwrap();
        admin.close().await;

        let options = PgConnectOptions::from_str(&url)
            .unwrap()
            .options([("search_path", format!("{schema},public"))]);
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .unwrap();

        let store = PgStore::from_pool(pool.clone());
        store.migrate().await.unwrap();
        sqlx::raw_sql(TRANSIT_FIXTURE).execute(&pool).await.unwrap();

        Some(Self {
            store,
            pool,
            schema,
        })
    }

    async fn user(&self, email: &str) -> UserId {
        self.store
            .create_user(NewUser {
                name: "Ana".to_string(),
                email: email.to_string(),
                password_hash: "$2b$04$hash".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    async fn close(self) {
        sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .execute(&self.pool)
            .await
            .unwrap();
        self.pool.close().await;
    }
}

fn stop(id: &str) -> StopId {
    StopId::parse(id).unwrap()
}

fn bus(id: &str) -> BusId {
    BusId::parse(id).unwrap()
}

#[tokio::test]
async fn migrations_can_run_twice() {
    let Some(db) = TestDb::connect().await else {
        return;
    };

    db.store.migrate().await.unwrap();
    db.close().await;
}

#[tokio::test]
async fn create_and_find_user() {
    let Some(db) = TestDb::connect().await else {
        return;
    };

    let id = db.user("ana@example.com").await;
    let found = db
        .store
        .find_user_by_email("ana@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, id);
    assert_eq!(found.role, Role::User);
    assert_eq!(found.password_hash, "$2b$04$hash");
    let missing = db.store.find_user_by_email("bob@example.com").await.unwrap();
    assert!(missing.is_none());

    db.close().await;
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let Some(db) = TestDb::connect().await else {
        return;
    };

    db.user("ana@example.com").await;
    let err = db
        .store
        .create_user(NewUser {
            name: "Other".to_string(),
            email: "ana@example.com".to_string(),
            password_hash: "x".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict("email")));

    db.close().await;
}

#[tokio::test]
async fn stops_and_existence_checks() {
    let Some(db) = TestDb::connect().await else {
        return;
    };

    let mut stops = db.store.all_stops().await.unwrap();
    stops.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
    let ids: Vec<&str> = stops.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["P1", "P2", "P3"]);
    assert_eq!(stops[0].description.as_deref(), Some("Praça stop"));

    assert!(db.store.stop_exists(&stop("P2")).await.unwrap());
    assert!(!db.store.stop_exists(&stop("nope")).await.unwrap());
    assert!(db.store.bus_exists(&bus("B1")).await.unwrap());
    assert!(!db.store.bus_exists(&bus("nope")).await.unwrap());

    db.close().await;
}

#[tokio::test]
async fn schedule_ordered_by_code_then_time() {
    let Some(db) = TestDb::connect().await else {
        return;
    };

    let schedule = db.store.stop_schedule(&stop("P1")).await.unwrap();
    let rows: Vec<(&str, String)> = schedule
        .iter()
        .map(|d| (d.bus_code.as_str(), d.departure_time.to_string()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("100", "07:00:00".to_string()),
            ("100", "08:00:00".to_string()),
            ("100", "09:00:00".to_string()),
            ("200", "07:30:00".to_string()),
        ]
    );
    assert!(db.store.stop_schedule(&stop("nope")).await.unwrap().is_empty());

    db.close().await;
}

#[tokio::test]
async fn route_lists_each_stop_once_at_lowest_sequence() {
    let Some(db) = TestDb::connect().await else {
        return;
    };

    let route = db.store.bus_route(&bus("B1")).await.unwrap();
    let stops: Vec<(&str, i32)> = route
        .iter()
        .map(|r| (r.stop_id.as_str(), r.stop_sequence))
        .collect();
    assert_eq!(stops, vec![("P1", 1), ("P2", 2), ("P3", 3)]);
    assert_eq!(route[0].stop_name, "Praça");
    assert_eq!(route[0].stop_description.as_deref(), Some("Praça stop"));

    db.close().await;
}

#[tokio::test]
async fn favorite_stops_are_idempotent_and_scoped_to_owner() {
    let Some(db) = TestDb::connect().await else {
        return;
    };
    let ana = db.user("ana@example.com").await;
    let bob = db.user("bob@example.com").await;

    let saved = db
        .store
        .add_favorite_stop(ana, &stop("P1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.user_id, ana);
    assert_eq!(saved.stop_id.as_str(), "P1");
    assert!(db.store.add_favorite_stop(ana, &stop("P2")).await.unwrap().is_some());
    assert!(db.store.add_favorite_stop(ana, &stop("P1")).await.unwrap().is_none());

    let favorites = db.store.favorite_stops(ana).await.unwrap();
    let ids: Vec<&str> = favorites.iter().map(|f| f.stop.id.as_str()).collect();
    assert_eq!(ids, vec!["P2", "P1"]);
    assert!(db.store.favorite_stops(bob).await.unwrap().is_empty());

    assert!(!db.store.remove_favorite_stop(bob, &stop("P1")).await.unwrap());
    assert!(db.store.remove_favorite_stop(ana, &stop("P1")).await.unwrap());
    assert!(!db.store.remove_favorite_stop(ana, &stop("P1")).await.unwrap());

    db.close().await;
}

#[tokio::test]
async fn favorite_buses_are_idempotent_and_sorted_by_code() {
    let Some(db) = TestDb::connect().await else {
        return;
    };
    let ana = db.user("ana@example.com").await;

    db.store.add_favorite_bus(ana, &bus("B2")).await.unwrap();
    db.store.add_favorite_bus(ana, &bus("B1")).await.unwrap();
    db.store.add_favorite_bus(ana, &bus("B2")).await.unwrap();

    let favorites = db.store.favorite_buses(ana).await.unwrap();
    let codes: Vec<&str> = favorites.iter().map(|f| f.bus.code.as_str()).collect();
    assert_eq!(codes, vec!["100", "200"]);

    assert!(db.store.remove_favorite_bus(ana, &bus("B2")).await.unwrap());
    assert!(!db.store.remove_favorite_bus(ana, &bus("B2")).await.unwrap());

    db.close().await;
}

#[tokio::test]
async fn reminders_round_trip_and_delete_by_owner() {
    let Some(db) = TestDb::connect().await else {
        return;
    };
    let ana = db.user("ana@example.com").await;
    let bob = db.user("bob@example.com").await;
    let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

    let reminder = |time: &str| {
        let departure_time = DepartureTime::parse(time).unwrap();
        NewReminder {
            user_id: ana,
            stop_id: stop("P1"),
            stop_name: "Praça".to_string(),
            bus_id: bus("B1"),
            bus_name: "Line 100".to_string(),
            bus_code: "100".to_string(),
            departure_time,
            remind_at: departure_time.reminder_for(today),
        }
    };

    let late = db.store.create_reminder(reminder("18:30")).await.unwrap();
    let early = db.store.create_reminder(reminder("06:15")).await.unwrap();
    assert_eq!(late.user_id, ana);
    assert_eq!(late.departure_time.to_string(), "18:30:00");
    assert_eq!(
        late.remind_at,
        NaiveDate::from_ymd_opt(2024, 3, 11)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap()
    );

    let ids: Vec<i64> = db
        .store
        .reminders(ana)
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![early.id, late.id]);
    assert!(db.store.reminders(bob).await.unwrap().is_empty());

    assert!(!db.store.delete_reminder(bob, early.id).await.unwrap());
    assert!(db.store.delete_reminder(ana, early.id).await.unwrap());
    assert_eq!(db.store.reminders(ana).await.unwrap().len(), 1);

    db.close().await;
}
