//! Partnership MDM API library.
//!
//! This crate primarily ships the `mdm-api` binary, but exposes its modules
//! so integration tests can assemble the router around in-process fakes.

pub mod api;
pub mod auth;
pub mod config;
pub mod partnerships;
pub mod state;
