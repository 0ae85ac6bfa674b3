//! In-process store.
//!
//! Keeps every table in memory behind a `tokio` `RwLock`. Stops, bus
//! lines and timetables are loaded from a JSON seed file; accounts,
//! favourites and reminders live only as long as the process.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::domain::{
    Bus, BusId, FavoriteBusEntry, FavoriteStop, FavoriteStopEntry, NewReminder, NewUser, Reminder,
    Role, RouteStop, ScheduledDeparture, Stop, StopId, StopTime, UserId, UserRecord,
};

use super::{
    FavoriteRepository, ReminderRepository, StoreError, TransitRepository, UserRepository,
};

/// Static transit inventory used to seed the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub stops: Vec<Stop>,
    #[serde(default)]
    pub buses: Vec<Bus>,
    #[serde(default)]
    pub stop_times: Vec<StopTime>,
}

impl SeedData {
    /// Load seed data from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Seed(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&json)
            .map_err(|e| StoreError::Seed(format!("failed to parse {}: {e}", path.display())))
    }

    /// Check that every timetable row points at a known stop and bus.
    fn validate(&self) -> Result<(), StoreError> {
        for row in &self.stop_times {
            if !self.stops.iter().any(|s| s.id == row.stop_id) {
                return Err(StoreError::Seed(format!(
                    "stop time references unknown stop {}",
                    row.stop_id
                )));
            }
            if !self.buses.iter().any(|b| b.id == row.bus_id) {
                return Err(StoreError::Seed(format!(
                    "stop time references unknown bus {}",
                    row.bus_id
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct FavoriteBus {
    user_id: UserId,
    bus_id: BusId,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<UserRecord>,
    stops: Vec<Stop>,
    buses: Vec<Bus>,
    stop_times: Vec<StopTime>,
    favorite_stops: Vec<FavoriteStop>,
    favorite_buses: Vec<FavoriteBus>,
    reminders: Vec<Reminder>,
    last_favorite_id: i64,
    last_reminder_id: i64,
}

impl Tables {
    fn stop(&self, id: &StopId) -> Option<&Stop> {
        self.stops.iter().find(|s| &s.id == id)
    }

    fn bus(&self, id: &BusId) -> Option<&Bus> {
        self.buses.iter().find(|b| &b.id == id)
    }
}

/// Thread-safe in-memory store.
#[derive(Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            clock,
        }
    }

    /// Create a store holding the given transit inventory.
    pub fn seeded(seed: SeedData, clock: Arc<dyn Clock + Send + Sync>) -> Result<Self, StoreError> {
        seed.validate()?;
        let tables = Tables {
            stops: seed.stops,
            buses: seed.buses,
            stop_times: seed.stop_times,
            ..Tables::default()
        };
        Ok(Self {
            tables: Arc::new(RwLock::new(tables)),
            clock,
        })
    }

    /// Create a store from a JSON seed file.
    pub fn from_seed_file(
        path: impl AsRef<Path>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self, StoreError> {
        Self::seeded(SeedData::from_file(path)?, clock)
    }

    /// Number of stops loaded.
    pub async fn stop_count(&self) -> usize {
        self.tables.read().await.stops.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email"));
        }

        let record = UserRecord {
            id: UserId::new_random(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: Role::default(),
            created_at: self.clock.utc(),
        };
        tables.users.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl TransitRepository for InMemoryStore {
    async fn all_stops(&self) -> Result<Vec<Stop>, StoreError> {
        Ok(self.tables.read().await.stops.clone())
    }

    async fn stop_exists(&self, stop: &StopId) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.stop(stop).is_some())
    }

    async fn bus_exists(&self, bus: &BusId) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.bus(bus).is_some())
    }

    async fn stop_schedule(&self, stop: &StopId) -> Result<Vec<ScheduledDeparture>, StoreError> {
        let tables = self.tables.read().await;

        let mut departures: Vec<ScheduledDeparture> = tables
            .stop_times
            .iter()
            .filter(|row| &row.stop_id == stop)
            .filter_map(|row| {
                let bus = tables.bus(&row.bus_id)?;
                Some(ScheduledDeparture {
                    bus_id: bus.id.clone(),
                    bus_name: bus.name.clone(),
                    bus_code: bus.code.clone(),
                    departure_time: row.departure_time,
                })
            })
            .collect();

        departures.sort_by(|a, b| {
            a.bus_code
                .cmp(&b.bus_code)
                .then(a.departure_time.cmp(&b.departure_time))
        });
        Ok(departures)
    }

    async fn bus_route(&self, bus: &BusId) -> Result<Vec<RouteStop>, StoreError> {
        let tables = self.tables.read().await;

        // Lowest sequence per stop, in first-seen order.
        let mut lowest: Vec<(&StopId, i32)> = Vec::new();
        for row in tables.stop_times.iter().filter(|row| &row.bus_id == bus) {
            match lowest.iter_mut().find(|(id, _)| *id == &row.stop_id) {
                Some((_, seq)) => *seq = (*seq).min(row.stop_sequence),
                None => lowest.push((&row.stop_id, row.stop_sequence)),
            }
        }

        let mut route: Vec<RouteStop> = lowest
            .into_iter()
            .filter_map(|(stop_id, stop_sequence)| {
                let stop = tables.stop(stop_id)?;
                Some(RouteStop {
                    stop_sequence,
                    stop_id: stop.id.clone(),
                    stop_name: stop.name.clone(),
                    stop_description: stop.description.clone(),
                    latitude: stop.latitude,
                    longitude: stop.longitude,
                })
            })
            .collect();

        route.sort_by_key(|r| r.stop_sequence);
        Ok(route)
    }
}

#[async_trait]
impl FavoriteRepository for InMemoryStore {
    async fn favorite_stops(&self, user: UserId) -> Result<Vec<FavoriteStopEntry>, StoreError> {
        let tables = self.tables.read().await;

        let mut entries: Vec<FavoriteStopEntry> = tables
            .favorite_stops
            .iter()
            .filter(|f| f.user_id == user)
            .filter_map(|f| {
                Some(FavoriteStopEntry {
                    id: f.id,
                    stop: tables.stop(&f.stop_id)?.clone(),
                    created_at: f.created_at,
                })
            })
            .collect();

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    async fn add_favorite_stop(
        &self,
        user: UserId,
        stop: &StopId,
    ) -> Result<Option<FavoriteStop>, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .favorite_stops
            .iter()
            .any(|f| f.user_id == user && &f.stop_id == stop)
        {
            return Ok(None);
        }

        tables.last_favorite_id += 1;
        let favorite = FavoriteStop {
            id: tables.last_favorite_id,
            user_id: user,
            stop_id: stop.clone(),
            created_at: self.clock.utc(),
        };
        tables.favorite_stops.push(favorite.clone());
        Ok(Some(favorite))
    }

    async fn remove_favorite_stop(&self, user: UserId, stop: &StopId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.favorite_stops.len();
        tables
            .favorite_stops
            .retain(|f| !(f.user_id == user && &f.stop_id == stop));
        Ok(tables.favorite_stops.len() < before)
    }

    async fn favorite_buses(&self, user: UserId) -> Result<Vec<FavoriteBusEntry>, StoreError> {
        let tables = self.tables.read().await;

        let mut entries: Vec<FavoriteBusEntry> = tables
            .favorite_buses
            .iter()
            .filter(|f| f.user_id == user)
            .filter_map(|f| {
                Some(FavoriteBusEntry {
                    bus: tables.bus(&f.bus_id)?.clone(),
                    created_at: f.created_at,
                })
            })
            .collect();

        entries.sort_by(|a, b| a.bus.code.cmp(&b.bus.code));
        Ok(entries)
    }

    async fn add_favorite_bus(&self, user: UserId, bus: &BusId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables
            .favorite_buses
            .iter()
            .any(|f| f.user_id == user && &f.bus_id == bus)
        {
            tables.favorite_buses.push(FavoriteBus {
                user_id: user,
                bus_id: bus.clone(),
                created_at: self.clock.utc(),
            });
        }
        Ok(())
    }

    async fn remove_favorite_bus(&self, user: UserId, bus: &BusId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.favorite_buses.len();
        tables
            .favorite_buses
            .retain(|f| !(f.user_id == user && &f.bus_id == bus));
        Ok(tables.favorite_buses.len() < before)
    }
}

#[async_trait]
impl ReminderRepository for InMemoryStore {
    async fn reminders(&self, user: UserId) -> Result<Vec<Reminder>, StoreError> {
        let tables = self.tables.read().await;
        let mut reminders: Vec<Reminder> = tables
            .reminders
            .iter()
            .filter(|r| r.user_id == user)
            .cloned()
            .collect();
        reminders.sort_by(|a, b| a.remind_at.cmp(&b.remind_at).then(a.id.cmp(&b.id)));
        Ok(reminders)
    }

    async fn create_reminder(&self, reminder: NewReminder) -> Result<Reminder, StoreError> {
        let mut tables = self.tables.write().await;
        tables.last_reminder_id += 1;

        let record = Reminder {
            id: tables.last_reminder_id,
            user_id: reminder.user_id,
            stop_id: reminder.stop_id,
            stop_name: reminder.stop_name,
            bus_id: reminder.bus_id,
            bus_name: reminder.bus_name,
            bus_code: reminder.bus_code,
            departure_time: reminder.departure_time,
            remind_at: reminder.remind_at,
            created_at: self.clock.utc(),
        };
        tables.reminders.push(record.clone());
        Ok(record)
    }

    async fn delete_reminder(&self, user: UserId, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.reminders.len();
        tables
            .reminders
            .retain(|r| !(r.id == id && r.user_id == user));
        Ok(tables.reminders.len() < before)
    }
}
