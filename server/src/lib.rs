//! College attendance library
//!
//! This library exposes the core functionality of the attendance server
//! for the binary and the integration tests.

pub mod api;
pub mod app;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod services;
