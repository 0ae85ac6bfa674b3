//! Web layer for the BusTrack API.
//!
//! Provides the HTTP endpoints for accounts, stops, bus routes, favourites
//! and reminders.

mod dto;
mod error;
mod extract;
mod routes;
mod state;

pub use dto::*;
pub use error::{AppError, OrInternal};
pub use extract::Authenticated;
pub use routes::create_router;
pub use state::AppState;
