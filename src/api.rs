// REST API with Axum
// Upload endpoint for CSV ledgers and the aggregate report

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::db::TransactionStore;
use crate::error::{LedgerError, UploadError};
use crate::ingest::import_upload;
use crate::record::TransactionView;
use crate::report::generate_report;

/// Multipart field carrying the CSV file
pub const UPLOAD_FIELD: &str = "transactions";

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

type SharedStore = Arc<Mutex<dyn TransactionStore + Send>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    store: SharedStore,
    max_upload_bytes: u64,
}

impl AppState {
    pub fn new<S>(store: S, max_upload_bytes: u64) -> Self
    where
        S: TransactionStore + Send + 'static,
    {
        AppState {
            store: Arc::new(Mutex::new(store)),
            max_upload_bytes,
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, dyn TransactionStore + Send + 'static>, ApiError> {
        self.store
            .lock()
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("transaction store lock poisoned")))
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    /// File-level rejection, reported against the upload field
    Upload(UploadError),
    Internal(anyhow::Error),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Upload(e) => ApiError::Upload(e),
            LedgerError::Storage(e) => ApiError::Internal(e),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Upload(e) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ UPLOAD_FIELD: [e.to_string()] })),
            )
                .into_response(),
            ApiError::Internal(e) => {
                error!("Request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

fn upload_error_from_multipart(err: MultipartError, max_upload_bytes: u64) -> UploadError {
    warn!("Failed to read multipart upload: {}", err);
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge {
            limit_bytes: max_upload_bytes,
        }
    } else {
        UploadError::Corrupt
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "OK" }))
}

/// Pull the `transactions` file out of the form as (file name, bytes)
async fn read_upload(
    multipart: &mut Multipart,
    max_upload_bytes: u64,
) -> Result<(String, Vec<u8>), UploadError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error_from_multipart(e, max_upload_bytes))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .ok_or(UploadError::Missing)?
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| upload_error_from_multipart(e, max_upload_bytes))?;

        return Ok((file_name, bytes.to_vec()));
    }

    Err(UploadError::Missing)
}

/// POST /api/v1/tax/transactions/ - Import a CSV file
async fn create_transactions(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (file_name, bytes) = read_upload(&mut multipart, state.max_upload_bytes)
        .await
        .map_err(ApiError::Upload)?;
    info!("POST /transactions/ - {} ({} bytes)", file_name, bytes.len());

    let created = {
        let store = state.store()?;
        import_upload(&*store, &file_name, &bytes, state.max_upload_bytes)?
    };

    let views: Vec<TransactionView> = created.iter().map(TransactionView::from).collect();
    Ok((StatusCode::CREATED, Json(views)))
}

/// GET /api/v1/tax/report/ - Aggregate income and expenses
async fn get_report(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let report = {
        let store = state.store()?;
        generate_report(&*store)?
    };

    Ok((StatusCode::OK, Json(report)))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let body_limit: usize = state
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES)
        .try_into()
        .unwrap_or(usize::MAX);

    let tax_routes = Router::new()
        .route("/transactions/", post(create_transactions))
        .route("/report/", get(get_report));

    Router::new()
        .route("/api/health", get(health_check))
        .nest("/api/v1/tax", tax_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::ingest::DEFAULT_MAX_UPLOAD_BYTES;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    const BOUNDARY: &str = "ledger-test-boundary";

    fn test_app() -> Router {
        let store = SqliteStore::open_in_memory().unwrap();
        router(AppState::new(store, DEFAULT_MAX_UPLOAD_BYTES))
    }

    fn upload_request(field: &str, file_name: &str, content: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: text/csv\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/v1/tax/transactions/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn report_request() -> Request<Body> {
        Request::builder()
            .uri("/api/v1/tax/report/")
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = test_app()
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upload_valid_csv() {
        let csv = b"2022-03-31,income,1000.0,Salary\n\
                    2022-03-31,expense,200.0,Transportation\n\
                    2022-03-31,income,500.0,123 Main St\n";

        let response = test_app()
            .oneshot(upload_request(UPLOAD_FIELD, "transactions.csv", csv))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response).await;
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["amount"], 1000.0);
        assert_eq!(items[0]["entry_type"], "income");
        assert_eq!(items[0]["memo_type"], "Expense Category");
        assert_eq!(items[2]["memo_type"], "Job Address");
        assert!(items[0]["id"].is_string());
    }

    #[tokio::test]
    async fn test_upload_with_only_bad_rows_creates_nothing() {
        let csv = b"2022-03-31,income,not_a_number,Salary\n\
                    2022-03-31,invalid_type,200.0,Transportation\n";

        let app = test_app();
        let response = app
            .clone()
            .oneshot(upload_request(UPLOAD_FIELD, "transactions.csv", csv))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json_body(response).await, serde_json::json!([]));

        let report = json_body(app.oneshot(report_request()).await.unwrap()).await;
        assert_eq!(report["gross-revenue"], 0.0);
    }

    #[tokio::test]
    async fn test_upload_wrong_extension() {
        let response = test_app()
            .oneshot(upload_request(UPLOAD_FIELD, "transactions.txt", b"some text"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(
            body[UPLOAD_FIELD][0],
            "Expected csv file with extension: '.csv', found file type of '.txt'"
        );
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        // Just over the limit, still inside the request body allowance
        let csv = "2022-03-28,income,123.45,Some memo\n".repeat(75_000);

        let response = test_app()
            .oneshot(upload_request(UPLOAD_FIELD, "transactions.csv", csv.as_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body[UPLOAD_FIELD][0], "CSV file is larger than 2.5 MB");
    }

    #[tokio::test]
    async fn test_upload_far_over_body_limit() {
        let csv = "2022-03-28,income,123.45,Some memo\n".repeat(100_000);

        let response = test_app()
            .oneshot(upload_request(UPLOAD_FIELD, "transactions.csv", csv.as_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body[UPLOAD_FIELD][0], "CSV file is larger than 2.5 MB");
    }

    #[tokio::test]
    async fn test_upload_corrupt_bytes() {
        let response = test_app()
            .oneshot(upload_request(UPLOAD_FIELD, "transactions.csv", &[0xff, 0xfe, 0xfd]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body[UPLOAD_FIELD][0], "CSV file is corrupt");
    }

    #[tokio::test]
    async fn test_upload_missing_field() {
        let response = test_app()
            .oneshot(upload_request("file", "transactions.csv", b"2022-03-31,income,1,Tips"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body[UPLOAD_FIELD][0], "No file was submitted.");
    }

    #[tokio::test]
    async fn test_upload_without_file_name() {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{UPLOAD_FIELD}\"\r\n\r\n\
             2022-03-31,income,1,Tips\r\n\
             --{BOUNDARY}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/tax/transactions/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body[UPLOAD_FIELD][0], "No file was submitted.");
    }

    #[tokio::test]
    async fn test_huge_totals_keep_server_usable() {
        let csv = b"2022-01-01,income,90000000000000000,Big\n";

        let app = test_app();
        for _ in 0..2 {
            let upload = app
                .clone()
                .oneshot(upload_request(UPLOAD_FIELD, "transactions.csv", csv))
                .await
                .unwrap();
            assert_eq!(upload.status(), StatusCode::CREATED);
        }

        let response = app.clone().oneshot(report_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report = json_body(response).await;
        let gross = report["gross-revenue"].as_f64().unwrap();
        assert!((gross - 1.8e17).abs() <= 1.8e17 * 1e-12);

        let later = app
            .oneshot(upload_request(UPLOAD_FIELD, "transactions.csv", b"2022-01-02,expense,1,Fuel"))
            .await
            .unwrap();
        assert_eq!(later.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_report_after_upload() {
        let csv = b"2023-04-04,income,10.00,123 Main St\n\
                    2023-04-04,income,20.00,456 Elm St\n\
                    2023-04-04,expense,5.00,Office supplies\n";

        let app = test_app();
        let upload = app
            .clone()
            .oneshot(upload_request(UPLOAD_FIELD, "transactions.csv", csv))
            .await
            .unwrap();
        assert_eq!(upload.status(), StatusCode::CREATED);

        let response = app.oneshot(report_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({
                "expenses": 5.0,
                "gross-revenue": 30.0,
                "net-revenue": 25.0,
            })
        );
    }

    #[tokio::test]
    async fn test_report_on_empty_ledger() {
        let response = test_app().oneshot(report_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({
                "expenses": 0.0,
                "gross-revenue": 0.0,
                "net-revenue": 0.0,
            })
        );
    }
}
