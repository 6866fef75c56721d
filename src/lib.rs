//! # School Auth Library
//!
//! Tenant-scoped authentication and authorization for the school platform:
//! credential verification, JWT issuance, revocable refresh sessions and
//! role-based permission checks, exposed over HTTP.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod seeds;
pub mod server;
pub mod telemetry;
pub use migration;
