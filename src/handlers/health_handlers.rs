//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks DB connectivity and the blob store

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Runs a lightweight query against SQLite (`SELECT 1`).
/// 2. Performs a put/get/delete round-trip against the blob store under a
///    throwaway key.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let service = &state.documents;

    // 1) SQLite check
    let sqlite_check = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*service.db)
        .await
    {
        Ok(v) if v == 1 => (true, None::<String>),
        Ok(v) => (false, Some(format!("unexpected result: {}", v))),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    // 2) Blob store round-trip under a key no real document uses
    let probe_key = format!("healthcheck/readyz-{}", Uuid::new_v4());
    let blob_check = match service
        .blobs
        .put(&service.bucket, &probe_key, None, Bytes::from_static(b"readyz"))
        .await
    {
        Ok(_) => match service.blobs.get(&service.bucket, &probe_key).await {
            Ok(bytes) if &bytes[..] == b"readyz" => {
                match service.blobs.delete(&service.bucket, &probe_key).await {
                    Ok(_) => (true, None::<String>),
                    Err(e) => (true, Some(format!("could not remove probe blob: {}", e))),
                }
            }
            Ok(_) => {
                let _ = service.blobs.delete(&service.bucket, &probe_key).await;
                (false, Some("probe blob content mismatch".to_string()))
            }
            Err(e) => {
                let _ = service.blobs.delete(&service.bucket, &probe_key).await;
                (false, Some(format!("could not read probe blob: {}", e)))
            }
        },
        Err(e) => (false, Some(format!("could not write probe blob: {}", e))),
    };

    let sqlite_ok = sqlite_check.0;
    let blobs_ok = blob_check.0;
    let overall_ok = sqlite_ok && blobs_ok;

    let mut checks = HashMap::new();
    checks.insert(
        "sqlite",
        CheckStatus {
            ok: sqlite_ok,
            error: sqlite_check.1,
        },
    );
    checks.insert(
        "blob_store",
        CheckStatus {
            ok: blobs_ok,
            error: blob_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
