//! # geoface-store
//!
//! SQLite persistence for geoface: accounts, face templates, the office
//! location, and the attendance ledger.
//!
//! The crate exposes an async [`Store`] handle over a single
//! `tokio_rusqlite` connection, with typed helpers per table. Schema
//! migrations run when the store is opened.

pub mod attendance;
pub mod database;
pub mod migrations;
pub mod office;
pub mod templates;
pub mod users;

mod error;

pub use attendance::{CheckIn, CheckOut, Transition};
pub use database::{default_db_path, Store};
pub use error::{Result, StoreError};
pub use users::{NewUser, UserProfile};
