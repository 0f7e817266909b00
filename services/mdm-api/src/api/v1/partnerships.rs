//! Partnership API endpoints.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::partnerships::{
    csv, BulkCreateOutcome, CreatePartnership, Pagination, Partnership, PartnershipFilter,
    PartnershipPatch, PartnershipStats, PartnershipStatus, SourceType,
};
use crate::state::AppState;

use super::ApiResponse;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Query parameters for listing partnerships.
#[derive(Debug, Default, Deserialize)]
pub struct ListPartnershipsQuery {
    pub status: Option<String>,
    pub region: Option<String>,
    pub search: Option<String>,
    pub tier: Option<String>,
    pub source_type: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Query parameters for CSV export.
#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub status: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListPartnershipsResponse {
    pub success: bool,
    pub message: String,
    pub data: Vec<Partnership>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

fn parse_enum<T>(value: Option<&str>, request_id: &str) -> Result<Option<T>, ApiError>
where
    T: std::str::FromStr<Err = crate::partnerships::ValidationError>,
{
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.trim().parse::<T>())
        .transpose()
        .map_err(|e| ApiError::validation(e).with_request_id(request_id))
}

impl ListPartnershipsQuery {
    fn into_parts(self, request_id: &str) -> Result<(PartnershipFilter, Pagination), ApiError> {
        let filter = PartnershipFilter {
            status: parse_enum::<PartnershipStatus>(self.status.as_deref(), request_id)?,
            region: self.region,
            search: self.search,
            tier: self.tier,
            source_type: parse_enum::<SourceType>(self.source_type.as_deref(), request_id)?,
        };
        let defaults = Pagination::default();
        let pagination = Pagination::new(
            self.page.unwrap_or(defaults.page()),
            self.page_size.unwrap_or(defaults.page_size()),
        )
        .map_err(|e| ApiError::validation(e).with_request_id(request_id))?;
        Ok((filter, pagination))
    }
}

fn bad_query(rejection: QueryRejection, request_id: &str) -> ApiError {
    ApiError::bad_request("invalid_query", rejection.body_text()).with_request_id(request_id)
}

fn bad_body(rejection: JsonRejection, request_id: &str) -> ApiError {
    ApiError::bad_request("invalid_body", rejection.body_text()).with_request_id(request_id)
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/v1/partnerships
pub async fn list_partnerships(
    State(state): State<AppState>,
    ctx: RequestContext,
    query: Result<Query<ListPartnershipsQuery>, QueryRejection>,
) -> Result<Json<ListPartnershipsResponse>, ApiError> {
    let request_id = ctx.request_id.clone();
    let Query(query) = query.map_err(|e| bad_query(e, &request_id))?;
    let (filter, pagination) = query.into_parts(&request_id)?;

    let store = state.partnerships();
    let (records, total) = tokio::try_join!(store.list(&filter, pagination), store.count(&filter))
        .map_err(|e| ApiError::from_partnership(e, &request_id))?;

    Ok(Json(ListPartnershipsResponse {
        success: true,
        message: format!("Retrieved {} partnerships", records.len()),
        data: records,
        total,
        page: pagination.page(),
        page_size: pagination.page_size(),
    }))
}

/// GET /api/v1/partnerships/{id}
pub async fn get_partnership(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Partnership>>, ApiError> {
    let request_id = ctx.request_id.clone();
    let record = state
        .partnerships()
        .get(&id)
        .await
        .map_err(|e| ApiError::from_partnership(e, &request_id))?
        .ok_or_else(|| {
            ApiError::not_found(
                "partnership_not_found",
                format!("Partnership with ID {id} not found"),
            )
            .with_request_id(request_id.clone())
        })?;

    Ok(Json(ApiResponse::ok(
        format!("Partnership {id} retrieved successfully"),
        record,
    )))
}

/// POST /api/v1/partnerships
pub async fn create_partnership(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Result<Json<CreatePartnership>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request_id = ctx.request_id.clone();
    let principal = ctx.principal()?;
    let Json(input) = body.map_err(|e| bad_body(e, &request_id))?;

    let record = state
        .partnerships()
        .create(input, &principal.subject_id)
        .await
        .map_err(|e| ApiError::from_partnership(e, &request_id))?;

    info!(
        request_id = %request_id,
        partnership_id = %record.id,
        email = %principal.email,
        "Partnership created"
    );

    let message = format!("Partnership {} created successfully", record.id);
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(message, record))).into_response())
}

/// PUT /api/v1/partnerships/{id}
pub async fn update_partnership(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    body: Result<Json<PartnershipPatch>, JsonRejection>,
) -> Result<Json<ApiResponse<Partnership>>, ApiError> {
    let request_id = ctx.request_id.clone();
    let principal = ctx.principal()?;
    let Json(patch) = body.map_err(|e| bad_body(e, &request_id))?;

    let record = state
        .partnerships()
        .update(&id, &patch, &principal.subject_id)
        .await
        .map_err(|e| ApiError::from_partnership(e, &request_id))?;

    info!(request_id = %request_id, partnership_id = %id, email = %principal.email, "Partnership updated");

    Ok(Json(ApiResponse::ok(
        format!("Partnership {id} updated successfully"),
        record,
    )))
}

/// DELETE /api/v1/partnerships/{id}
///
/// Soft delete: the record stays, with status `Inactive`.
pub async fn delete_partnership(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let request_id = ctx.request_id.clone();
    let principal = ctx.principal()?;

    let deleted = state
        .partnerships()
        .soft_delete(&id, &principal.subject_id)
        .await
        .map_err(|e| ApiError::from_partnership(e, &request_id))?;

    if !deleted {
        return Err(ApiError::not_found(
            "partnership_not_found",
            format!("Partnership with ID {id} not found"),
        )
        .with_request_id(request_id));
    }

    info!(request_id = %request_id, partnership_id = %id, email = %principal.email, "Partnership deleted");

    Ok(Json(ApiResponse::empty(format!(
        "Partnership {id} deleted successfully"
    ))))
}

/// GET /api/v1/partnerships/stats/summary
pub async fn partnership_stats(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<ApiResponse<PartnershipStats>>, ApiError> {
    let stats = state
        .partnerships()
        .stats()
        .await
        .map_err(|e| ApiError::from_partnership(e, &ctx.request_id))?;

    Ok(Json(ApiResponse::ok(
        "Partnership statistics retrieved successfully",
        stats,
    )))
}

/// POST /api/v1/partnerships/bulk
///
/// Items are created in order; a failing item never aborts the batch.
pub async fn bulk_create_partnerships(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Result<Json<Vec<CreatePartnership>>, JsonRejection>,
) -> Result<Json<ApiResponse<BulkCreateOutcome>>, ApiError> {
    let request_id = ctx.request_id.clone();
    let principal = ctx.principal()?;
    let Json(inputs) = body.map_err(|e| bad_body(e, &request_id))?;

    let outcome = state
        .partnerships()
        .bulk_create(inputs, &principal.subject_id)
        .await;

    let message = format!(
        "Bulk operation completed. Created: {}, Errors: {}",
        outcome.summary.successful, outcome.summary.failed
    );
    Ok(Json(ApiResponse::ok(message, outcome)))
}

/// GET /api/v1/partnerships/export/csv
pub async fn export_partnerships_csv(
    State(state): State<AppState>,
    ctx: RequestContext,
    query: Result<Query<ExportQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let request_id = ctx.request_id.clone();
    let Query(query) = query.map_err(|e| bad_query(e, &request_id))?;

    let filter = PartnershipFilter {
        status: parse_enum::<PartnershipStatus>(query.status.as_deref(), &request_id)?,
        region: query.region,
        ..Default::default()
    };

    let records = state
        .partnerships()
        .list_all(&filter)
        .await
        .map_err(|e| ApiError::from_partnership(e, &request_id))?;

    info!(request_id = %request_id, count = records.len(), "Exported partnerships to CSV");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=partnerships.csv",
            ),
        ],
        csv::render(&records),
    )
        .into_response())
}
