//! Partnership reads and writes against the warehouse.
//!
//! Each operation is a sequence of independent warehouse round trips. The
//! existence pre-checks in `create`, `update` and `soft_delete` are not atomic
//! with the write that follows: two concurrent creates of the same id can both
//! pass the check.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use mdm_warehouse::{Row, TableRef, Warehouse};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::PartnershipError;
use super::model::{CreatePartnership, Partnership, PartnershipPatch};
use super::query::{
    build_count_query, build_get_by_id_query, build_list_query, build_soft_delete_statement,
    build_stats_query, build_update_statement, Pagination, PartnershipFilter, MAX_PAGE_SIZE,
};

/// Aggregate counts over the whole table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnershipStats {
    pub total_partnerships: u64,
    pub active_partnerships: u64,
    pub inactive_partnerships: u64,
    pub unique_regions: u64,
    pub unique_source_types: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkItemError {
    pub partnership_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub total_requested: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Per-item results of a bulk create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkCreateOutcome {
    pub created: Vec<Partnership>,
    pub errors: Vec<BulkItemError>,
    pub summary: BulkSummary,
}

#[derive(Deserialize)]
struct CountRow {
    total: u64,
}

/// Warehouse timestamps carry microsecond precision.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn decode<T: DeserializeOwned>(row: Row) -> Result<T, PartnershipError> {
    serde_json::from_value(serde_json::Value::Object(row))
        .map_err(|e| PartnershipError::Decode(e.to_string()))
}

fn encode(record: &Partnership) -> Result<Row, PartnershipError> {
    match serde_json::to_value(record) {
        Ok(serde_json::Value::Object(row)) => Ok(row),
        Ok(_) => Err(PartnershipError::Decode(
            "record did not serialize to an object".to_string(),
        )),
        Err(e) => Err(PartnershipError::Decode(e.to_string())),
    }
}

/// Partnership record store.
#[derive(Clone)]
pub struct PartnershipStore {
    warehouse: Arc<dyn Warehouse>,
    table: TableRef,
}

impl PartnershipStore {
    pub fn new(warehouse: Arc<dyn Warehouse>, table: TableRef) -> Self {
        Self { warehouse, table }
    }

    pub async fn list(
        &self,
        filter: &PartnershipFilter,
        pagination: Pagination,
    ) -> Result<Vec<Partnership>, PartnershipError> {
        let rows = self
            .warehouse
            .execute_query(&build_list_query(&self.table, filter, pagination))
            .await?;
        rows.into_iter().map(decode).collect()
    }

    /// Number of records matching `filter`.
    pub async fn count(&self, filter: &PartnershipFilter) -> Result<u64, PartnershipError> {
        let rows = self
            .warehouse
            .execute_query(&build_count_query(&self.table, filter))
            .await?;
        match rows.into_iter().next() {
            Some(row) => Ok(decode::<CountRow>(row)?.total),
            None => Ok(0),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Partnership>, PartnershipError> {
        let rows = self
            .warehouse
            .execute_query(&build_get_by_id_query(&self.table, id))
            .await?;
        rows.into_iter().next().map(decode).transpose()
    }

    /// Create a record. Returns the record as assembled here, not re-read.
    pub async fn create(
        &self,
        input: CreatePartnership,
        actor_id: &str,
    ) -> Result<Partnership, PartnershipError> {
        if self.get(&input.id).await?.is_some() {
            return Err(PartnershipError::DuplicateId(input.id));
        }

        input.validate()?;

        let record = input.into_record(actor_id, now());
        let errors = self
            .warehouse
            .insert_rows(&self.table, vec![encode(&record)?])
            .await?;

        if !errors.is_empty() {
            let detail = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            warn!(partnership_id = %record.id, errors = %detail, "Warehouse rejected insert");
            return Err(PartnershipError::InsertRejected(detail));
        }

        info!(partnership_id = %record.id, actor_id = %actor_id, "Created partnership");
        Ok(record)
    }

    /// Apply a partial update and return the record as re-read afterwards.
    pub async fn update(
        &self,
        id: &str,
        patch: &PartnershipPatch,
        actor_id: &str,
    ) -> Result<Partnership, PartnershipError> {
        if self.get(id).await?.is_none() {
            return Err(PartnershipError::NotFound(id.to_string()));
        }

        let changes = patch.changes()?;
        let statement = build_update_statement(&self.table, id, &changes, actor_id, now());
        let affected = self.warehouse.execute_statement(&statement).await?;
        info!(
            partnership_id = %id,
            actor_id = %actor_id,
            columns = changes.len(),
            affected,
            "Updated partnership"
        );

        self.get(id)
            .await?
            .ok_or_else(|| PartnershipError::NotFound(id.to_string()))
    }

    /// Mark a record `Inactive`. Returns `false` if it does not exist.
    pub async fn soft_delete(&self, id: &str, actor_id: &str) -> Result<bool, PartnershipError> {
        if self.get(id).await?.is_none() {
            return Ok(false);
        }

        self.warehouse
            .execute_statement(&build_soft_delete_statement(
                &self.table,
                id,
                actor_id,
                now(),
            ))
            .await?;

        info!(partnership_id = %id, actor_id = %actor_id, "Soft-deleted partnership");
        Ok(true)
    }

    pub async fn stats(&self) -> Result<PartnershipStats, PartnershipError> {
        let rows = self
            .warehouse
            .execute_query(&build_stats_query(&self.table))
            .await?;
        match rows.into_iter().next() {
            Some(row) => decode(row),
            None => Ok(PartnershipStats::default()),
        }
    }

    /// Create each input in order. A failing item is recorded and the rest
    /// are still attempted.
    pub async fn bulk_create(
        &self,
        inputs: Vec<CreatePartnership>,
        actor_id: &str,
    ) -> BulkCreateOutcome {
        let total_requested = inputs.len();
        let mut created = Vec::new();
        let mut errors = Vec::new();

        for input in inputs {
            let partnership_id = input.id.clone();
            match self.create(input, actor_id).await {
                Ok(record) => created.push(record),
                Err(e) => {
                    if !e.is_client_error() {
                        warn!(partnership_id = %partnership_id, error = %e, "Bulk item failed");
                    }
                    errors.push(BulkItemError {
                        partnership_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            successful = created.len(),
            failed = errors.len(),
            actor_id = %actor_id,
            "Bulk create finished"
        );

        BulkCreateOutcome {
            summary: BulkSummary {
                total_requested,
                successful: created.len(),
                failed: errors.len(),
            },
            created,
            errors,
        }
    }

    /// Every record matching `filter`, fetched a page at a time.
    pub async fn list_all(
        &self,
        filter: &PartnershipFilter,
    ) -> Result<Vec<Partnership>, PartnershipError> {
        let mut records = Vec::new();
        let mut page = 1;
        loop {
            let pagination = Pagination::new(page, MAX_PAGE_SIZE)?;
            let batch = self.list(filter, pagination).await?;
            let short = batch.len() < MAX_PAGE_SIZE as usize;
            records.extend(batch);
            if short {
                return Ok(records);
            }
            page += 1;
        }
    }
}
