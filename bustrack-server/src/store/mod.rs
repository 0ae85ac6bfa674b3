//! Persistence ports and adapters.
//!
//! Handlers talk to the store through the repository traits below, so the
//! HTTP layer can run against PostgreSQL in production and against
//! in-process tables in development and tests.

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::domain::{
    BusId, FavoriteBusEntry, FavoriteStop, FavoriteStopEntry, NewReminder, NewUser, Reminder,
    RouteStop, ScheduledDeparture, Stop, StopId, UserId, UserRecord,
};

pub use memory::{InMemoryStore, SeedData};
pub use postgres::PgStore;

/// Errors from the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated
    #[error("{0} already exists")]
    Conflict(&'static str),

    /// Database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data could not be mapped to domain types
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Seed data could not be loaded
    #[error("seed data error: {0}")]
    Seed(String),
}

/// Registered accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Create an account. Fails with [`StoreError::Conflict`] if the email
    /// is taken.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;
}

/// Stops, bus lines and timetables.
#[async_trait]
pub trait TransitRepository: Send + Sync {
    async fn all_stops(&self) -> Result<Vec<Stop>, StoreError>;

    async fn stop_exists(&self, stop: &StopId) -> Result<bool, StoreError>;

    async fn bus_exists(&self, bus: &BusId) -> Result<bool, StoreError>;

    /// Departures from a stop, ordered by bus code then departure time.
    async fn stop_schedule(&self, stop: &StopId) -> Result<Vec<ScheduledDeparture>, StoreError>;

    /// Stops served by a bus, once each at its lowest sequence number,
    /// in sequence order.
    async fn bus_route(&self, bus: &BusId) -> Result<Vec<RouteStop>, StoreError>;
}

/// Per-user favourite stops and bus lines.
#[async_trait]
pub trait FavoriteRepository: Send + Sync {
    /// Favourite stops, newest first.
    async fn favorite_stops(&self, user: UserId) -> Result<Vec<FavoriteStopEntry>, StoreError>;

    /// Save a favourite stop. Returns `None` if it was already saved.
    async fn add_favorite_stop(
        &self,
        user: UserId,
        stop: &StopId,
    ) -> Result<Option<FavoriteStop>, StoreError>;

    /// Returns whether a favourite was removed.
    async fn remove_favorite_stop(&self, user: UserId, stop: &StopId) -> Result<bool, StoreError>;

    /// Favourite bus lines, ordered by line code.
    async fn favorite_buses(&self, user: UserId) -> Result<Vec<FavoriteBusEntry>, StoreError>;

    /// Save a favourite bus line; saving it twice is a no-op.
    async fn add_favorite_bus(&self, user: UserId, bus: &BusId) -> Result<(), StoreError>;

    async fn remove_favorite_bus(&self, user: UserId, bus: &BusId) -> Result<bool, StoreError>;
}

/// Departure reminders.
#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// Reminders for a user, soonest first.
    async fn reminders(&self, user: UserId) -> Result<Vec<Reminder>, StoreError>;

    async fn create_reminder(&self, reminder: NewReminder) -> Result<Reminder, StoreError>;

    /// Delete a reminder owned by `user`. Returns whether one was removed.
    async fn delete_reminder(&self, user: UserId, id: i64) -> Result<bool, StoreError>;
}

/// Everything the HTTP layer needs from persistence.
pub trait Store: UserRepository + TransitRepository + FavoriteRepository + ReminderRepository {}

impl<T> Store for T where
    T: UserRepository + TransitRepository + FavoriteRepository + ReminderRepository
{
}
