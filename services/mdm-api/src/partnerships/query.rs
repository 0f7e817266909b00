//! Statement construction for the partnership table.
//!
//! Every value reaches the warehouse as a named parameter; statement text
//! only ever contains column names, parameter names, and the quoted table
//! reference.

use chrono::{DateTime, Utc};
use mdm_warehouse::{QueryParameter, Statement, TableRef};

use super::error::ValidationError;
use super::model::{FieldChange, PartnershipStatus, SourceType};

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Parameter naming the record id in lookups and updates.
pub const ID_PARAM: &str = "partnership_id";

/// List filters. Absent fields impose no predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartnershipFilter {
    pub status: Option<PartnershipStatus>,
    /// Substring match against the stored region list.
    pub region: Option<String>,
    /// Case-insensitive substring match against name or id.
    pub search: Option<String>,
    pub tier: Option<String>,
    pub source_type: Option<SourceType>,
}

/// Offset pagination, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    page_size: u32,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Result<Self, ValidationError> {
        if page < 1 {
            return Err(ValidationError::new("page", "must be at least 1").with_value(page.to_string()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ValidationError::new(
                "page_size",
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            )
            .with_value(page_size.to_string()));
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Escape `LIKE` metacharacters so the value matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn filter_clause(filter: &PartnershipFilter) -> (String, Vec<QueryParameter>) {
    let mut predicates = Vec::new();
    let mut params = Vec::new();

    if let Some(status) = filter.status {
        predicates.push("status = @status");
        params.push(QueryParameter::string("status", status.as_str()));
    }
    if let Some(region) = non_blank(&filter.region) {
        predicates.push("region LIKE @region");
        params.push(QueryParameter::string(
            "region",
            format!("%{}%", escape_like(region)),
        ));
    }
    if let Some(search) = non_blank(&filter.search) {
        predicates.push("(LOWER(name) LIKE @search OR LOWER(id) LIKE @search)");
        params.push(QueryParameter::string(
            "search",
            format!("%{}%", escape_like(&search.to_lowercase())),
        ));
    }
    if let Some(tier) = non_blank(&filter.tier) {
        predicates.push("tier = @tier");
        params.push(QueryParameter::string("tier", tier));
    }
    if let Some(source_type) = filter.source_type {
        predicates.push("source_type = @source_type");
        params.push(QueryParameter::string("source_type", source_type.as_str()));
    }

    let clause = if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    };
    (clause, params)
}

/// One page of records matching `filter`, ordered by name.
pub fn build_list_query(
    table: &TableRef,
    filter: &PartnershipFilter,
    pagination: Pagination,
) -> Statement {
    let (clause, params) = filter_clause(filter);
    let sql = format!(
        "SELECT * FROM {}{clause} ORDER BY name ASC LIMIT @limit OFFSET @offset",
        table.quoted()
    );

    params
        .into_iter()
        .fold(Statement::new(sql), Statement::bind)
        .bind(QueryParameter::int64("limit", pagination.limit()))
        .bind(QueryParameter::int64("offset", pagination.offset()))
}

/// Number of records matching `filter`, ignoring pagination.
pub fn build_count_query(table: &TableRef, filter: &PartnershipFilter) -> Statement {
    let (clause, params) = filter_clause(filter);
    let sql = format!("SELECT COUNT(*) AS total FROM {}{clause}", table.quoted());
    params.into_iter().fold(Statement::new(sql), Statement::bind)
}

pub fn build_get_by_id_query(table: &TableRef, id: &str) -> Statement {
    Statement::new(format!(
        "SELECT * FROM {} WHERE id = @{ID_PARAM} LIMIT 1",
        table.quoted()
    ))
    .bind(QueryParameter::string(ID_PARAM, id))
}

/// `UPDATE ... SET col = @col, ...` for the given changes plus the audit
/// columns.
pub fn build_update_statement(
    table: &TableRef,
    id: &str,
    changes: &[FieldChange],
    actor_id: &str,
    now: DateTime<Utc>,
) -> Statement {
    let assignments: Vec<String> = changes
        .iter()
        .map(|c| c.column)
        .chain(["updated_at", "updated_by"])
        .map(|column| format!("{column} = @{column}"))
        .collect();

    let sql = format!(
        "UPDATE {} SET {} WHERE id = @{ID_PARAM}",
        table.quoted(),
        assignments.join(", ")
    );

    changes
        .iter()
        .fold(Statement::new(sql), |stmt, change| {
            stmt.bind(QueryParameter::nullable_string(
                change.column,
                change.value.clone(),
            ))
        })
        .bind(QueryParameter::timestamp("updated_at", now))
        .bind(QueryParameter::string("updated_by", actor_id))
        .bind(QueryParameter::string(ID_PARAM, id))
}

/// Flip `status` to `Inactive`, touching only the audit columns besides.
pub fn build_soft_delete_statement(
    table: &TableRef,
    id: &str,
    actor_id: &str,
    now: DateTime<Utc>,
) -> Statement {
    Statement::new(format!(
        "UPDATE {} SET status = @status, updated_at = @updated_at, updated_by = @updated_by \
         WHERE id = @{ID_PARAM}",
        table.quoted()
    ))
    .bind(QueryParameter::string("status", PartnershipStatus::Inactive.as_str()))
    .bind(QueryParameter::timestamp("updated_at", now))
    .bind(QueryParameter::string("updated_by", actor_id))
    .bind(QueryParameter::string(ID_PARAM, id))
}

pub fn build_stats_query(table: &TableRef) -> Statement {
    Statement::new(format!(
        "SELECT \
         COUNT(*) AS total_partnerships, \
         COUNTIF(status = @active_status) AS active_partnerships, \
         COUNTIF(status = @inactive_status) AS inactive_partnerships, \
         COUNT(DISTINCT region) AS unique_regions, \
         COUNT(DISTINCT source_type) AS unique_source_types \
         FROM {}",
        table.quoted()
    ))
    .bind(QueryParameter::string(
        "active_status",
        PartnershipStatus::Active.as_str(),
    ))
    .bind(QueryParameter::string(
        "inactive_status",
        PartnershipStatus::Inactive.as_str(),
    ))
}
