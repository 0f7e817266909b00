//! # mdm-warehouse
//!
//! The storage-engine surface used by the MDM API.
//!
//! ## Design Principles
//!
//! - Callers own query text; this crate only executes it
//! - Every value reaches the engine as a typed, named parameter
//! - Rows come back as column-name keyed JSON maps so callers decode them
//!   with serde
//!
//! ## Operations
//!
//! - `execute_query`: run a parameterized `SELECT` and collect its rows
//! - `execute_statement`: run a parameterized DML statement and report the
//!   affected row count
//! - `insert_rows`: stream rows into a table, returning per-row errors
//!
//! [`BigQueryClient`] implements [`Warehouse`] over the BigQuery v2 REST API.

mod bigquery;
mod config;
mod error;
mod params;
mod table;
mod token;

pub use bigquery::BigQueryClient;
pub use config::WarehouseConfig;
pub use error::{InsertError, WarehouseError};
pub use params::{ParameterValue, QueryParameter, Statement};
pub use table::TableRef;
pub use token::TokenSource;

use async_trait::async_trait;

/// A single result row keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Operations the MDM core needs from a warehouse engine.
///
/// Implementations must be safe to share between concurrent requests.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Execute a parameterized query and return every result row.
    async fn execute_query(&self, statement: &Statement) -> Result<Vec<Row>, WarehouseError>;

    /// Execute a parameterized DML statement, returning the affected row count.
    async fn execute_statement(&self, statement: &Statement) -> Result<u64, WarehouseError>;

    /// Insert rows into a table.
    ///
    /// Transport failures are returned as `Err`; rows the engine rejected are
    /// returned as `Ok` with one entry per failure. An empty list means every
    /// row was accepted.
    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: Vec<Row>,
    ) -> Result<Vec<InsertError>, WarehouseError>;

    /// Check that the engine is reachable.
    async fn health_check(&self) -> Result<(), WarehouseError> {
        self.execute_query(&Statement::new("SELECT 1")).await?;
        Ok(())
    }
}
