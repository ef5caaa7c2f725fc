use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Query, State, multipart::MultipartError,
        rejection::JsonRejection,
    },
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use handlebars::Handlebars;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::downloader::{to_csv, to_xlsx};
use crate::error::KpiError;
use crate::graph::{GraphOptions, create_line_chart};
use crate::kpi::{Kpi, calculate_kpis};
use crate::loader::from_xlsx_bytes;
use crate::record::RecordSet;
use crate::template::{TEMPLATE_FILE_NAME, XLSX_MIME, sample_workbook};

/// Multipart field carrying the uploaded workbook
pub const UPLOAD_FIELD: &str = "file";

const INDEX_PAGE: &str = "index";

/// Shared, read-only state. Nothing uploaded is kept here.
pub struct AppState {
    config: Config,
    pages: Handlebars<'static>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let mut pages = Handlebars::new();
        pages.register_template_string(INDEX_PAGE, include_str!("./static/index.hbs"))?;
        Ok(AppState { config, pages })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[derive(Serialize)]
struct ApiResponse {
    status: String,
    message: Option<String>,
}

#[derive(Serialize)]
struct KpiResponse {
    status: String,
    uploaded: RecordSet,
    kpis: RecordSet,
    derived: Vec<Kpi>,
    numeric_columns: Vec<String>,
}

#[derive(Deserialize)]
struct ChartRequest {
    table: RecordSet,
    x: String,
    y: String,
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum ExportFormat {
    Csv,
    Xlsx,
}

#[derive(Deserialize)]
struct ExportQuery {
    format: ExportFormat,
}

#[derive(Serialize, Default)]
struct PageView {
    template_file: &'static str,
    error: Option<String>,
    uploaded: Option<TableView>,
    kpis: Option<TableView>,
    derived: Vec<&'static str>,
    chart: Option<ChartView>,
}

#[derive(Serialize)]
struct TableView {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl From<&RecordSet> for TableView {
    fn from(table: &RecordSet) -> Self {
        TableView {
            columns: table.column_names().iter().map(|s| s.to_string()).collect(),
            rows: table
                .rows()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct ChartView {
    numeric_columns: Vec<String>,
    x: String,
    y: String,
    /// KPI table as JSON, safe to embed in a `<script>` element
    table_json: String,
}

/// The outcome of processing one upload
struct Analysis {
    uploaded: RecordSet,
    kpis: RecordSet,
    derived: Vec<Kpi>,
}

impl Analysis {
    fn numeric_columns(&self) -> Vec<String> {
        self.kpis
            .numeric_columns()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

/// Builds the application router
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(serve_landing))
        .route("/template", get(download_template))
        .route("/upload", post(upload_page))
        .route("/api/kpis", post(api_kpis))
        .route("/api/chart", post(api_chart))
        .route("/api/export", post(api_export))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.bind_addr;
    let app_state = Arc::new(AppState::new(config)?);
    let app = router(app_state);

    // Start server
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_landing(State(state): State<Arc<AppState>>) -> Response {
    render_page(&state, &landing_view())
}

async fn download_template() -> Response {
    match sample_workbook() {
        Ok(bytes) => attachment(XLSX_MIME, TEMPLATE_FILE_NAME, bytes),
        Err(e) => error_response(&e),
    }
}

async fn upload_page(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let analysis = match read_upload(multipart).await {
        Ok(bytes) => analyse(&bytes),
        Err((status, message)) => {
            let view = PageView {
                error: Some(message),
                ..landing_view()
            };
            return (status, render_page(&state, &view)).into_response();
        }
    };

    match analysis {
        Ok(analysis) => render_page(&state, &analysis_view(&analysis)),
        Err(e) => {
            let view = PageView {
                error: Some(e.to_string()),
                ..landing_view()
            };
            (status_for(&e), render_page(&state, &view)).into_response()
        }
    }
}

async fn api_kpis(multipart: Multipart) -> Response {
    let bytes = match read_upload(multipart).await {
        Ok(bytes) => bytes,
        Err((status, message)) => return api_error(status, message),
    };

    match analyse(&bytes) {
        Ok(analysis) => {
            let numeric_columns = analysis.numeric_columns();
            Json(KpiResponse {
                status: "ok".to_string(),
                uploaded: analysis.uploaded,
                kpis: analysis.kpis,
                derived: analysis.derived,
                numeric_columns,
            })
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn api_chart(
    State(state): State<Arc<AppState>>,
    request: Result<Json<ChartRequest>, JsonRejection>,
) -> Response {
    let request = match request {
        Ok(Json(request)) => request,
        Err(rejection) => return json_rejection(rejection),
    };
    let options = GraphOptions::for_columns(
        &request.x,
        &request.y,
        state.config.chart_width,
        state.config.chart_height,
    );

    match create_line_chart(&request.table, &request.x, &request.y, &options) {
        Ok(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn api_export(
    Query(query): Query<ExportQuery>,
    table: Result<Json<RecordSet>, JsonRejection>,
) -> Response {
    let table = match table {
        Ok(Json(table)) => table,
        Err(rejection) => return json_rejection(rejection),
    };
    match query.format {
        ExportFormat::Csv => attachment("text/csv", "kpis.csv", to_csv(&table).into_bytes()),
        ExportFormat::Xlsx => match to_xlsx(&table, "KPIs") {
            Ok(bytes) => attachment(XLSX_MIME, "kpis.xlsx", bytes),
            Err(e) => error_response(&e),
        },
    }
}

// Pulls the workbook bytes out of the upload form
async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, (StatusCode, String)> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field.bytes().await.map_err(multipart_error)?;
            if bytes.is_empty() {
                break;
            }
            return Ok(bytes.to_vec());
        }
    }

    warn!("upload rejected: no '{}' field with data", UPLOAD_FIELD);
    Err((StatusCode::BAD_REQUEST, "No file data received".to_string()))
}

// Oversized bodies surface as multipart errors carrying a 413 status
fn multipart_error(error: MultipartError) -> (StatusCode, String) {
    let status = error.status();
    warn!("upload rejected: {}", error.body_text());
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        (status, "The uploaded file is too large".to_string())
    } else {
        (StatusCode::BAD_REQUEST, error.body_text())
    }
}

fn analyse(bytes: &[u8]) -> Result<Analysis, KpiError> {
    let mut uploaded =
        from_xlsx_bytes(bytes).inspect_err(|e| warn!("upload rejected: {}", e))?;
    uploaded.normalize_column_names()?;

    let mut kpis = uploaded.clone();
    let derived = calculate_kpis(&mut kpis)?;

    Ok(Analysis {
        uploaded,
        kpis,
        derived,
    })
}

fn landing_view() -> PageView {
    PageView {
        template_file: TEMPLATE_FILE_NAME,
        ..PageView::default()
    }
}

fn analysis_view(analysis: &Analysis) -> PageView {
    let numeric_columns = analysis.numeric_columns();

    // A chart needs two distinct numeric columns
    let chart = if numeric_columns.len() > 1 {
        let x = numeric_columns[0].clone();
        let y = numeric_columns[1].clone();
        serde_json::to_string(&analysis.kpis)
            .ok()
            .map(|json| ChartView {
                numeric_columns,
                x,
                y,
                table_json: escape_script_json(&json),
            })
    } else {
        None
    };

    PageView {
        uploaded: Some(TableView::from(&analysis.uploaded)),
        kpis: Some(TableView::from(&analysis.kpis)),
        derived: analysis.derived.iter().map(Kpi::column_name).collect(),
        chart,
        ..landing_view()
    }
}

// Keeps uploaded text from ending the `<script>` element or opening a comment
fn escape_script_json(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

fn render_page(state: &AppState, view: &PageView) -> Response {
    match state.pages.render(INDEX_PAGE, view) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            warn!("failed to render page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn attachment(content_type: &str, filename: &str, body: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", filename);
    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition.as_str()),
        ],
        body,
    )
        .into_response()
}

fn status_for(error: &KpiError) -> StatusCode {
    if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn error_response(error: &KpiError) -> Response {
    api_error(status_for(error), error.to_string())
}

// Malformed or invalid tables are the caller's fault, reported like any
// other API error
fn json_rejection(rejection: JsonRejection) -> Response {
    warn!("request rejected: {}", rejection.body_text());
    api_error(StatusCode::BAD_REQUEST, rejection.body_text())
}

fn api_error(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ApiResponse {
            status: "error".to_string(),
            message: Some(message),
        }),
    )
        .into_response()
}
