//! Shared test doubles.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::Router;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;

use crate::auth::{PasswordHasher, SigningSecret, TokenService};
use crate::cache::CacheConfig;
use crate::domain::{Bus, BusId, DepartureTime, Role, Stop, StopId, StopTime, UserId};
use crate::store::{InMemoryStore, SeedData};
use crate::web::{AppState, create_router};

/// A clock that stays where it is put.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// 2024-03-15 10:00:00 UTC.
    pub fn fixture() -> Arc<Self> {
        Arc::new(Self::new(fixture_timestamp()))
    }

    pub fn advance(&self, delta: TimeDelta) {
        *self.lock_clock() += delta;
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

pub fn fixture_timestamp() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).single() {
        Some(ts) => ts,
        None => panic!("valid fixture timestamp"),
    }
}

/// Reference point for transit fixtures (Praça da Sé, São Paulo).
pub const CENTRE: (f64, f64) = (-23.5505, -46.6333);

/// Degrees of latitude per metre on the fixture sphere.
const DEG_PER_M: f64 = 1.0 / 111_194.93;

fn fixture_stop(id: &str, name: &str, metres_north: f64) -> Stop {
    Stop {
        id: StopId::parse(id).unwrap(),
        name: name.to_string(),
        latitude: CENTRE.0 + metres_north * DEG_PER_M,
        longitude: CENTRE.1,
        description: Some(format!("Ponto {name}")),
    }
}

fn fixture_stop_time(bus: &str, stop: &str, time: &str, seq: i32) -> StopTime {
    StopTime {
        bus_id: BusId::parse(bus).unwrap(),
        stop_id: StopId::parse(stop).unwrap(),
        departure_time: DepartureTime::parse(time).unwrap(),
        stop_sequence: seq,
    }
}

/// A small network: three stops north of [`CENTRE`] and two lines.
pub fn fixture_seed() -> SeedData {
    SeedData {
        stops: vec![
            fixture_stop("P-SE", "Sé", 0.0),
            fixture_stop("P-LIB", "Liberdade", 500.0),
            fixture_stop("P-LUZ", "Luz", 5_000.0),
        ],
        buses: vec![
            Bus {
                id: BusId::parse("B-200").unwrap(),
                name: "Luz - Sé".to_string(),
                code: "200".to_string(),
            },
            Bus {
                id: BusId::parse("B-100").unwrap(),
                name: "Sé - Liberdade".to_string(),
                code: "100".to_string(),
            },
        ],
        stop_times: vec![
            fixture_stop_time("B-100", "P-SE", "08:00", 1),
            fixture_stop_time("B-100", "P-LIB", "08:10", 2),
            fixture_stop_time("B-100", "P-SE", "07:00", 1),
            fixture_stop_time("B-200", "P-LUZ", "06:40", 1),
            fixture_stop_time("B-200", "P-SE", "07:05", 2),
        ],
    }
}

/// Application state over an in-memory store and a fixed clock.
pub struct TestApp {
    pub state: AppState,
    pub clock: Arc<FixedClock>,
}

impl TestApp {
    pub fn new() -> Self {
        let clock = FixedClock::fixture();
        let store = InMemoryStore::seeded(fixture_seed(), clock.clone()).unwrap();
        let tokens = TokenService::new(&SigningSecret::new("test-secret"), clock.clone());
        let state = AppState::new(
            Arc::new(store),
            tokens,
            PasswordHasher::new(4, 2),
            &CacheConfig::default(),
            clock.clone(),
        );
        Self { state, clock }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// A bearer header for a fresh user id.
    pub fn bearer(&self, user: UserId) -> String {
        let token = self.state.tokens.issue_token(user, Role::User).unwrap();
        format!("Bearer {token}")
    }
}
