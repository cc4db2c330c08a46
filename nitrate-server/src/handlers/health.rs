//! `GET /healthz`: liveness probe, not part of the retry/config wire
//! contract but required of any deployable service (SPEC_FULL.md §4.10).

use axum::Json;
use serde_json::{json, Value};

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
