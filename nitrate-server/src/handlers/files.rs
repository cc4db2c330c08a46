//! `/api/files*`: list/detail/suggest/retry/batch-retry/batch-delete
//! (SPEC_FULL.md §4.10).

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use nitrate_core::db::{MediaFile, MediaFilter, MediaSort, RetryOutcome, Status};

use crate::app_state::AppState;
use crate::errors::AppError;

const MAX_LIMIT: i64 = 500;
const DEFAULT_LIMIT: i64 = 20;
const SUGGEST_MAX_LIMIT: i64 = 100;
const SUGGEST_DEFAULT_LIMIT: i64 = 20;
const MAX_BATCH: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    skip: Option<i64>,
    limit: Option<i64>,
    status: Option<String>,
    search: Option<String>,
    sort: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse {
    total: i64,
    skip: i64,
    limit: i64,
    has_next: bool,
    has_previous: bool,
    items: Vec<MediaFile>,
}

pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let skip = query.skip.unwrap_or(0);
    if skip < 0 {
        return Err(AppError::unprocessable("skip must be >= 0"));
    }
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::unprocessable(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }

    let mut statuses = Vec::new();
    if let Some(raw) = &query.status {
        for token in raw.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let status: Status = token
                .parse()
                .map_err(|_| AppError::unprocessable(format!("invalid status '{token}'")))?;
            statuses.push(status);
        }
    }

    let search_tokens = query
        .search
        .as_deref()
        .unwrap_or("")
        .split_whitespace()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let sort = match query.sort.as_deref() {
        Some(raw) => MediaSort::parse(raw)
            .ok_or_else(|| AppError::unprocessable(format!("invalid sort '{raw}'")))?,
        None => MediaSort::default(),
    };

    let filter = MediaFilter {
        statuses,
        search_tokens,
    };

    let page = state.repo.list(&filter, sort, skip, limit).await?;

    Ok(Json(ListResponse {
        total: page.total,
        skip,
        limit,
        has_next: skip + limit < page.total,
        has_previous: skip > 0,
        items: page.items,
    }))
}

pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MediaFile>, AppError> {
    let file = state
        .repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("media file {id} not found")))?;
    Ok(Json(file))
}

#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    keyword: Option<String>,
    limit: Option<i64>,
}

pub async fn suggest_files(
    State(state): State<AppState>,
    Query(query): Query<SuggestQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    let limit = query.limit.unwrap_or(SUGGEST_DEFAULT_LIMIT);
    if !(1..=SUGGEST_MAX_LIMIT).contains(&limit) {
        return Err(AppError::unprocessable(format!(
            "limit must be between 1 and {SUGGEST_MAX_LIMIT}"
        )));
    }

    let keyword = query.keyword.unwrap_or_default();
    let names = state.repo.distinct_filenames(&keyword, limit).await?;
    Ok(Json(names))
}

#[derive(Serialize)]
pub struct RetryResponse {
    message: String,
    file_id: i64,
    previous_status: Status,
    current_status: Status,
}

pub async fn retry_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RetryResponse>, AppError> {
    match state.repo.retry(id).await? {
        RetryOutcome::NotFound => Err(AppError::not_found(format!("media file {id} not found"))),
        RetryOutcome::NotRetryable(status) => Err(AppError::bad_request(format!(
            "media file {id} is {status}, not retryable"
        ))),
        RetryOutcome::Retried { previous_status } => Ok(Json(RetryResponse {
            message: "queued for retry".to_string(),
            file_id: id,
            previous_status,
            current_status: Status::Pending,
        })),
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    file_ids: Vec<i64>,
}

#[derive(Serialize)]
pub struct BatchItemResult {
    file_id: i64,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn validate_batch(req: &BatchRequest) -> Result<(), AppError> {
    if req.file_ids.is_empty() || req.file_ids.len() > MAX_BATCH {
        return Err(AppError::unprocessable(format!(
            "file_ids must contain between 1 and {MAX_BATCH} entries"
        )));
    }
    Ok(())
}

pub async fn batch_retry(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<Vec<BatchItemResult>>, AppError> {
    validate_batch(&req)?;

    let mut results = Vec::with_capacity(req.file_ids.len());
    for id in req.file_ids {
        let result = match state.repo.retry(id).await {
            Ok(RetryOutcome::Retried { .. }) => BatchItemResult {
                file_id: id,
                success: true,
                error: None,
            },
            Ok(RetryOutcome::NotFound) => BatchItemResult {
                file_id: id,
                success: false,
                error: Some("not found".to_string()),
            },
            Ok(RetryOutcome::NotRetryable(status)) => BatchItemResult {
                file_id: id,
                success: false,
                error: Some(format!("{status} is not retryable")),
            },
            Err(e) => BatchItemResult {
                file_id: id,
                success: false,
                error: Some(e.to_string()),
            },
        };
        results.push(result);
    }

    Ok(Json(results))
}

pub async fn batch_delete(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<Vec<BatchItemResult>>, AppError> {
    validate_batch(&req)?;

    let mut results = Vec::with_capacity(req.file_ids.len());
    for id in req.file_ids {
        let result = match state.repo.delete(id).await {
            Ok(true) => BatchItemResult {
                file_id: id,
                success: true,
                error: None,
            },
            Ok(false) => BatchItemResult {
                file_id: id,
                success: false,
                error: Some("not found".to_string()),
            },
            Err(e) => BatchItemResult {
                file_id: id,
                success: false,
                error: Some(e.to_string()),
            },
        };
        results.push(result);
    }

    Ok(Json(results))
}

