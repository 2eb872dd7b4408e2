//! Job-application tracking over a row-oriented data service.
//!
//! Each entity type (jobs, reminders, notes, the profile) gets a resource hook
//! that keeps the signed-in user's list in memory, writes through the
//! [`remote::RemoteDataService`], and reports outcomes to a
//! [`notify::Notifier`].

pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod models;
pub mod notes;
pub mod notify;
pub mod profile;
pub mod reminders;
pub mod remote;
pub mod resource;
pub mod rest;
pub mod session;
pub mod store;
pub mod timeline;

#[cfg(test)]
mod testing;

pub use error::{Error, RemoteError, Result};
