//! BusTrack API server.
//!
//! Backend for a public-transit companion app: user accounts with signed
//! bearer tokens, nearest-stop search, stop timetables, bus routes,
//! favourites and departure reminders.

pub mod auth;
pub mod cache;
pub mod config;
pub mod domain;
pub mod proximity;
pub mod store;
pub mod web;

#[cfg(test)]
mod test_support;
