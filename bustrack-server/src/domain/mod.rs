//! Domain types for the transit companion API.
//!
//! Identifier and time types enforce their invariants at construction
//! time, so handlers and stores that receive them can trust their
//! validity.

mod geo;
mod ids;
mod records;
mod role;
mod time;

pub use geo::GeoPoint;
pub use ids::{BusId, InvalidId, StopId, UserId};
pub use records::{
    Bus, FavoriteBusEntry, FavoriteStop, FavoriteStopEntry, NewReminder, NewUser, Reminder,
    RouteStop, ScheduledDeparture, Stop, StopTime, UserRecord,
};
pub use role::{Role, UnknownRole};
pub use time::{DepartureTime, TimeError};
