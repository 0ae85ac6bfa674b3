//! Records read from and written to the store.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BusId, DepartureTime, GeoPoint, Role, StopId, UserId};

/// A registered account, including its authentication material.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// bcrypt hash; the plaintext password is never kept.
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to register a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// A bus stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl Stop {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// A bus line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    /// Public line code, e.g. "101".
    pub code: String,
}

/// One timetable row: a bus leaving a stop at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopTime {
    pub bus_id: BusId,
    pub stop_id: StopId,
    pub departure_time: DepartureTime,
    pub stop_sequence: i32,
}

/// A departure from a stop joined with its bus line.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledDeparture {
    pub bus_id: BusId,
    pub bus_name: String,
    pub bus_code: String,
    pub departure_time: DepartureTime,
}

/// A stop along a bus line's route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStop {
    pub stop_sequence: i32,
    pub stop_id: StopId,
    pub stop_name: String,
    pub stop_description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// A stop saved as favourite.
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteStop {
    pub id: i64,
    pub user_id: UserId,
    pub stop_id: StopId,
    pub created_at: DateTime<Utc>,
}

/// A favourite stop joined with the stop's details.
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteStopEntry {
    pub id: i64,
    pub stop: Stop,
    pub created_at: DateTime<Utc>,
}

/// A favourite bus line joined with the line's details.
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteBusEntry {
    pub bus: Bus,
    pub created_at: DateTime<Utc>,
}

/// A reminder for a departure.
///
/// Stop and bus names are copied at creation time so the reminder stays
/// readable even if the timetable changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub id: i64,
    pub user_id: UserId,
    pub stop_id: StopId,
    pub stop_name: String,
    pub bus_id: BusId,
    pub bus_name: String,
    pub bus_code: String,
    pub departure_time: DepartureTime,
    pub remind_at: NaiveDateTime,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a reminder.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub user_id: UserId,
    pub stop_id: StopId,
    pub stop_name: String,
    pub bus_id: BusId,
    pub bus_name: String,
    pub bus_code: String,
    pub departure_time: DepartureTime,
    pub remind_at: NaiveDateTime,
}
