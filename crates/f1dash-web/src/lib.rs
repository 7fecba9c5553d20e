//! JSON query and upload API for the F1 job dashboard, plus Plotly figure
//! view models for the charts.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use f1dash_core::{
    CategoryCount, DailyJobPostings, DashboardConfig, FilterOptions, Mistake, StateMetric,
    TimeSeriesPoint,
};
use f1dash_metrics::{Aggregator, DateRange, MetricFilters, MistakeQuery, TimeBucket};
use f1dash_resume::{score_upload, UploadOutcome, UploadedDocument, NO_TEXT_MESSAGE};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

pub const CRATE_NAME: &str = "f1dash-web";

const DEFAULT_TOP_N: usize = 15;
const UPLOAD_LIMIT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: DashboardConfig,
    pub aggregator: Aggregator,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        let aggregator = Aggregator::new(&config);
        Self { config, aggregator }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
struct RangeQuery {
    start: Option<String>,
    end: Option<String>,
}

impl RangeQuery {
    fn range(&self) -> Result<DateRange, ApiError> {
        date_range(self.start.as_deref(), self.end.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
struct TopQuery {
    n: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MistakesQuery {
    start: Option<String>,
    end: Option<String>,
    source: Option<String>,
    mistake_type: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SeriesQuery {
    start: Option<String>,
    end: Option<String>,
    bucket: Option<String>,
}

impl SeriesQuery {
    fn parts(&self) -> Result<(DateRange, TimeBucket), ApiError> {
        let range = date_range(self.start.as_deref(), self.end.as_deref())?;
        let bucket = match non_empty(self.bucket.as_deref()) {
            Some(raw) => raw
                .parse::<TimeBucket>()
                .map_err(|err| ApiError::BadRequest(err.to_string()))?,
            None => TimeBucket::default(),
        };
        Ok((range, bucket))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    non_empty(value)
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                ApiError::BadRequest(format!("{field} must be a YYYY-MM-DD date, got {raw:?}"))
            })
        })
        .transpose()
}

fn date_range(start: Option<&str>, end: Option<&str>) -> Result<DateRange, ApiError> {
    Ok(DateRange::new(
        parse_date("start", start)?,
        parse_date("end", end)?,
    ))
}

fn parse_count(field: &str, value: Option<&str>) -> Result<Option<usize>, ApiError> {
    non_empty(value)
        .map(|raw| {
            raw.parse().map_err(|_| {
                ApiError::BadRequest(format!("{field} must be a non-negative integer, got {raw:?}"))
            })
        })
        .transpose()
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/filters", get(filters_handler))
        .route("/api/states", get(states_handler))
        .route("/api/states/top/jobs", get(top_jobs_handler))
        .route("/api/states/top/h1b", get(top_h1b_handler))
        .route("/api/states/{code}", get(state_detail_handler))
        .route("/api/jobs/daily", get(daily_jobs_handler))
        .route("/api/mistakes", get(mistakes_handler))
        .route("/api/mistakes/by-type", get(mistakes_by_type_handler))
        .route("/api/mistakes/by-source", get(mistakes_by_source_handler))
        .route("/api/mistakes/timeseries", get(mistakes_series_handler))
        .route(
            "/api/resume",
            post(resume_handler).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route("/charts/states", get(states_chart_handler))
        .route("/charts/states/top/jobs", get(top_jobs_chart_handler))
        .route("/charts/states/top/h1b", get(top_h1b_chart_handler))
        .route("/charts/states/{code}", get(state_chart_handler))
        .route("/charts/jobs/daily", get(daily_jobs_chart_handler))
        .route("/charts/mistakes/by-type", get(mistakes_by_type_chart_handler))
        .route("/charts/mistakes/by-source", get(mistakes_by_source_chart_handler))
        .route("/charts/mistakes/timeseries", get(mistakes_series_chart_handler))
        .with_state(Arc::new(state))
}

pub async fn serve(config: DashboardConfig) -> anyhow::Result<()> {
    let port = config.web_port;
    let state = AppState::new(config);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, data_dir = %state.config.data_dir.display(), "dashboard api listening");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Aggregator queries read Parquet tables from disk, so they run on the
/// blocking pool.
async fn query_blocking<T, F>(state: &Arc<AppState>, query: F) -> Result<T, ApiError>
where
    F: FnOnce(&Aggregator) -> T + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || query(&state.aggregator))
        .await
        .map_err(|err| {
            error!(error = %err, "dashboard query task failed");
            ApiError::Internal("dashboard query failed".into())
        })
}

fn top_n(query: &TopQuery) -> Result<usize, ApiError> {
    Ok(parse_count("n", query.n.as_deref())?.unwrap_or(DEFAULT_TOP_N))
}

async fn filters_handler(State(state): State<Arc<AppState>>) -> Json<FilterOptions> {
    Json(state.aggregator.filter_options().clone())
}

async fn states_handler(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<MetricFilters>,
) -> ApiResult<Vec<StateMetric>> {
    query_blocking(&state, move |agg| agg.state_metrics(&filters))
        .await
        .map(Json)
}

async fn state_detail_handler(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(filters): Query<MetricFilters>,
) -> ApiResult<StateMetric> {
    let lookup = code.clone();
    query_blocking(&state, move |agg| agg.state_detail(&lookup, &filters))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no metrics for state {code:?}")))
}

async fn top_jobs_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopQuery>,
) -> ApiResult<Vec<StateMetric>> {
    let n = top_n(&query)?;
    query_blocking(&state, move |agg| agg.top_states_by_jobs(n))
        .await
        .map(Json)
}

async fn top_h1b_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopQuery>,
) -> ApiResult<Vec<StateMetric>> {
    let n = top_n(&query)?;
    query_blocking(&state, move |agg| agg.top_states_by_h1b(n))
        .await
        .map(Json)
}

async fn daily_jobs_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Vec<DailyJobPostings>> {
    let range = query.range()?;
    query_blocking(&state, move |agg| agg.daily_job_trend(range))
        .await
        .map(Json)
}

async fn mistakes_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MistakesQuery>,
) -> ApiResult<Vec<Mistake>> {
    let mistake_query = MistakeQuery {
        range: date_range(query.start.as_deref(), query.end.as_deref())?,
        source: query.source,
        mistake_type: query.mistake_type,
    };
    let limit = parse_count("limit", query.limit.as_deref())?;
    let mut rows = query_blocking(&state, move |agg| agg.mistakes_filtered(&mistake_query)).await?;
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    Ok(Json(rows))
}

async fn mistakes_by_type_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Vec<CategoryCount>> {
    let range = query.range()?;
    query_blocking(&state, move |agg| agg.mistakes_by_type(range))
        .await
        .map(Json)
}

async fn mistakes_by_source_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Vec<CategoryCount>> {
    let range = query.range()?;
    query_blocking(&state, move |agg| agg.mistakes_by_source(range))
        .await
        .map(Json)
}

async fn mistakes_series_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SeriesQuery>,
) -> ApiResult<Vec<TimeSeriesPoint>> {
    let (range, bucket) = query.parts()?;
    query_blocking(&state, move |agg| agg.mistakes_time_series(range, bucket))
        .await
        .map(Json)
}

async fn resume_handler(mut multipart: Multipart) -> ApiResult<f1dash_resume::ResumeReport> {
    let mut document = None;
    let mut job_description = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                document = Some(UploadedDocument::new(file_name, bytes.to_vec()));
            }
            "job_description" => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                job_description = Some(text);
            }
            _ => {}
        }
    }
    let document =
        document.ok_or_else(|| ApiError::BadRequest("missing multipart field \"file\"".into()))?;

    let outcome = tokio::task::spawn_blocking(move || {
        score_upload(&document, non_empty(job_description.as_deref()))
    })
    .await
    .map_err(|err| {
        error!(error = %err, "resume scoring task failed");
        ApiError::Internal("resume scoring failed".into())
    })?;

    match outcome {
        UploadOutcome::Report(report) => Ok(Json(report)),
        UploadOutcome::NoTextExtracted => Err(ApiError::Unprocessable(NO_TEXT_MESSAGE.into())),
    }
}

fn figure(data: Value, layout: Value) -> Json<Value> {
    Json(json!({ "data": data, "layout": layout }))
}

fn state_hover(m: &StateMetric) -> String {
    format!(
        "<b>{}</b><br>Jobs: {}<br>H1B petitions: {}<br>Score: {}",
        m.state, m.job_count, m.petitions, m.effectiveness_score
    )
}

fn effectiveness_choropleth(metrics: &[StateMetric]) -> Value {
    json!({
        "type": "choropleth",
        "locationmode": "USA-states",
        "locations": metrics.iter().map(|m| m.state.as_str()).collect::<Vec<_>>(),
        "z": metrics.iter().map(|m| m.effectiveness_score).collect::<Vec<_>>(),
        "colorscale": "Reds",
        "colorbar": {"title": "Effectiveness"},
        "hoverinfo": "text",
        "hovertext": metrics.iter().map(state_hover).collect::<Vec<_>>(),
    })
}

async fn states_chart_handler(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<MetricFilters>,
) -> Result<Json<Value>, ApiError> {
    let metrics = query_blocking(&state, move |agg| agg.state_metrics(&filters)).await?;
    Ok(figure(
        json!([effectiveness_choropleth(&metrics)]),
        json!({
            "title": "Job Effectiveness by State",
            "geo": {"scope": "usa", "showlakes": true, "lakecolor": "rgb(255,255,255)"},
            "margin": {"l": 0, "r": 0, "t": 40, "b": 0},
            "height": 550,
        }),
    ))
}

/// Single-state map; an unknown code gives an empty figure titled
/// "No data for ..." rather than an error.
async fn state_chart_handler(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(filters): Query<MetricFilters>,
) -> Result<Json<Value>, ApiError> {
    let lookup = code.clone();
    let detail = query_blocking(&state, move |agg| agg.state_detail(&lookup, &filters)).await?;
    let Some(metric) = detail else {
        let label = code.trim().to_ascii_uppercase();
        return Ok(figure(json!([]), json!({ "title": format!("No data for {label}") })));
    };
    Ok(figure(
        json!([effectiveness_choropleth(std::slice::from_ref(&metric))]),
        json!({
            "title": format!("Job effectiveness: {}", metric.state),
            "geo": {
                "scope": "usa",
                "center": {"lat": 39, "lon": -98},
                "lataxis": {"range": [24, 50]},
                "lonaxis": {"range": [-126, -66]},
            },
            "margin": {"l": 0, "r": 0, "t": 40, "b": 0},
            "height": 400,
        }),
    ))
}

fn state_bar(metrics: &[StateMetric], y: Vec<u64>, title: &str, y_title: &str) -> Json<Value> {
    figure(
        json!([{
            "type": "bar",
            "x": metrics.iter().map(|m| m.state.as_str()).collect::<Vec<_>>(),
            "y": y,
        }]),
        json!({
            "title": title,
            "xaxis": {"title": "State"},
            "yaxis": {"title": y_title},
        }),
    )
}

async fn top_jobs_chart_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopQuery>,
) -> Result<Json<Value>, ApiError> {
    let n = top_n(&query)?;
    let top = query_blocking(&state, move |agg| agg.top_states_by_jobs(n)).await?;
    let jobs = top.iter().map(|m| m.job_count).collect();
    Ok(state_bar(&top, jobs, "Top states by job count", "Jobs"))
}

async fn top_h1b_chart_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopQuery>,
) -> Result<Json<Value>, ApiError> {
    let n = top_n(&query)?;
    let top = query_blocking(&state, move |agg| agg.top_states_by_h1b(n)).await?;
    let petitions = top.iter().map(|m| m.petitions).collect();
    Ok(state_bar(&top, petitions, "Top states by H1B petitions", "H1B petitions"))
}

async fn daily_jobs_chart_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Value>, ApiError> {
    let range = query.range()?;
    let daily = query_blocking(&state, move |agg| agg.daily_job_trend(range)).await?;
    Ok(figure(
        json!([{
            "type": "scatter",
            "mode": "lines+markers",
            "name": "Total postings",
            "x": daily.iter().map(|d| d.date).collect::<Vec<_>>(),
            "y": daily.iter().map(|d| d.total_postings).collect::<Vec<_>>(),
        }]),
        json!({
            "title": "Daily job postings",
            "xaxis": {"title": "Date"},
            "yaxis": {"title": "Postings"},
            "height": 350,
        }),
    ))
}

async fn mistakes_by_type_chart_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Value>, ApiError> {
    let range = query.range()?;
    let counts = query_blocking(&state, move |agg| agg.mistakes_by_type(range)).await?;
    Ok(figure(
        json!([{
            "type": "bar",
            "x": counts.iter().map(|c| c.label.as_str()).collect::<Vec<_>>(),
            "y": counts.iter().map(|c| c.count).collect::<Vec<_>>(),
        }]),
        json!({
            "title": "Mistakes by type",
            "xaxis": {"title": "Type", "tickangle": -45},
            "yaxis": {"title": "Count"},
        }),
    ))
}

async fn mistakes_by_source_chart_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Value>, ApiError> {
    let range = query.range()?;
    let counts = query_blocking(&state, move |agg| agg.mistakes_by_source(range)).await?;
    Ok(figure(
        json!([{
            "type": "pie",
            "labels": counts.iter().map(|c| c.label.as_str()).collect::<Vec<_>>(),
            "values": counts.iter().map(|c| c.count).collect::<Vec<_>>(),
        }]),
        json!({ "title": "Mistakes by application source" }),
    ))
}

async fn mistakes_series_chart_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SeriesQuery>,
) -> Result<Json<Value>, ApiError> {
    let (range, bucket) = query.parts()?;
    let series = query_blocking(&state, move |agg| agg.mistakes_time_series(range, bucket)).await?;
    let period = match bucket {
        TimeBucket::Day => "daily",
        TimeBucket::Week => "weekly",
        TimeBucket::Month => "monthly",
    };
    Ok(figure(
        json!([{
            "type": "scatter",
            "mode": "lines+markers",
            "name": "Mistakes",
            "x": series.iter().map(|p| p.date).collect::<Vec<_>>(),
            "y": series.iter().map(|p| p.count).collect::<Vec<_>>(),
        }]),
        json!({
            "title": format!("Mistakes over time ({period})"),
            "xaxis": {"title": "Date"},
            "yaxis": {"title": "Count"},
            "height": 350,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const BOUNDARY: &str = "f1dash-test-boundary";

    fn test_app(dir: &std::path::Path) -> Router {
        let config = DashboardConfig {
            synthetic_anchor: NaiveDate::from_ymd_opt(2025, 6, 30),
            ..DashboardConfig::with_data_dir(dir)
        };
        app(AppState::new(config))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE].to_str().unwrap(),
            "application/json"
        );
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn upload_request(file_name: &str, content: &[u8], job_description: Option<&str>) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
        if let Some(jd) = job_description {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"job_description\"\r\n\r\n{jd}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/api/resume")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn every_get_route_answers_json() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());
        for uri in [
            "/health",
            "/api/filters",
            "/api/states",
            "/api/states/CA",
            "/api/states/top/jobs",
            "/api/states/top/h1b?n=5",
            "/api/jobs/daily",
            "/api/mistakes",
            "/api/mistakes/by-type",
            "/api/mistakes/by-source",
            "/api/mistakes/timeseries",
            "/charts/states",
            "/charts/states/top/jobs",
            "/charts/states/top/h1b?n=5",
            "/charts/states/TX",
            "/charts/jobs/daily",
            "/charts/mistakes/by-type",
            "/charts/mistakes/by-source",
            "/charts/mistakes/timeseries?bucket=month",
        ] {
            let (status, _) = get_json(app.clone(), uri).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn state_views_cover_the_canonical_list() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());

        let (_, states) = get_json(app.clone(), "/api/states?job_type=Internship").await;
        assert_eq!(states.as_array().unwrap().len(), 51);

        let (_, top) = get_json(app.clone(), "/api/states/top/jobs").await;
        let top = top.as_array().unwrap();
        assert_eq!(top.len(), DEFAULT_TOP_N);
        assert!(top
            .windows(2)
            .all(|w| w[0]["job_count"].as_u64() >= w[1]["job_count"].as_u64()));

        let (status, detail) = get_json(app, "/api/states/ca").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["state"], "CA");
    }

    #[tokio::test]
    async fn unknown_state_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get_json(test_app(dir.path()), "/api/states/ZZ").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("ZZ"));
    }

    #[tokio::test]
    async fn malformed_parameters_are_bad_requests() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());
        for uri in [
            "/api/jobs/daily?start=June",
            "/api/mistakes?end=2025-13-01",
            "/api/mistakes?limit=-1",
            "/api/states/top/jobs?n=many",
            "/charts/states/top/h1b?n=-3",
            "/api/mistakes/timeseries?bucket=fortnight",
            "/charts/mistakes/by-type?start=yesterday",
        ] {
            let (status, body) = get_json(app.clone(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn mistakes_filter_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());

        let (_, linkedin) = get_json(
            app.clone(),
            "/api/mistakes?start=2025-06-01&end=2025-06-30&source=LinkedIn",
        )
        .await;
        let linkedin = linkedin.as_array().unwrap();
        assert!(!linkedin.is_empty());
        assert!(linkedin.iter().all(|m| m["source"] == "LinkedIn"));

        let (_, limited) = get_json(app.clone(), "/api/mistakes?limit=7").await;
        assert_eq!(limited.as_array().unwrap().len(), 7);

        let (_, empty) = get_json(app, "/api/mistakes?start=2030-01-01").await;
        assert_eq!(empty, json!([]));
    }

    #[tokio::test]
    async fn daily_range_is_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let (_, daily) = get_json(
            test_app(dir.path()),
            "/api/jobs/daily?start=2025-06-01&end=2025-06-30",
        )
        .await;
        let daily = daily.as_array().unwrap();
        assert_eq!(daily.len(), 30);
        assert_eq!(daily[0]["date"], "2025-06-01");
        assert_eq!(daily[29]["date"], "2025-06-30");
    }

    #[tokio::test]
    async fn chart_view_models_are_plotly_figures() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());
        let (_, map) = get_json(app.clone(), "/charts/states").await;
        assert_eq!(map["data"][0]["type"], "choropleth");
        assert_eq!(map["data"][0]["locations"].as_array().unwrap().len(), 51);
        assert_eq!(map["layout"]["geo"]["scope"], "usa");

        let (_, bars) = get_json(app, "/charts/mistakes/by-type").await;
        let total: u64 = bars["data"][0]["y"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_u64())
            .sum();
        assert_eq!(total, 500);
    }

    #[tokio::test]
    async fn top_state_bars_follow_the_rankings() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());

        let (_, ranking) = get_json(app.clone(), "/api/states/top/h1b?n=5").await;
        let (_, bars) = get_json(app.clone(), "/charts/states/top/h1b?n=5").await;
        let states: Vec<Value> = ranking
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["state"].clone())
            .collect();
        let petitions: Vec<Value> = ranking
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["petitions"].clone())
            .collect();
        assert_eq!(bars["data"][0]["type"], "bar");
        assert_eq!(bars["data"][0]["x"], json!(states));
        assert_eq!(bars["data"][0]["y"], json!(petitions));
        assert_eq!(bars["layout"]["title"], "Top states by H1B petitions");

        let (_, jobs) = get_json(app, "/charts/states/top/jobs").await;
        assert_eq!(jobs["data"][0]["x"].as_array().unwrap().len(), DEFAULT_TOP_N);
        assert_eq!(jobs["layout"]["yaxis"]["title"], "Jobs");
    }

    #[tokio::test]
    async fn single_state_map_focuses_on_one_state() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());

        let (_, detail) = get_json(app.clone(), "/api/states/NY").await;
        let (status, map) = get_json(app.clone(), "/charts/states/ny").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(map["data"][0]["type"], "choropleth");
        assert_eq!(map["data"][0]["locations"], json!(["NY"]));
        let score = detail["effectiveness_score"].clone();
        assert_eq!(map["data"][0]["z"], json!([score]));
        assert_eq!(map["layout"]["height"], 400);

        let (status, empty) = get_json(app, "/charts/states/zz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(empty["data"], json!([]));
        assert_eq!(empty["layout"]["title"], "No data for ZZ");
    }

    #[tokio::test]
    async fn text_resume_upload_returns_report() {
        let dir = tempfile::tempdir().unwrap();
        let resp = test_app(dir.path())
            .oneshot(upload_request(
                "resume.txt",
                b"Summary: Python and SQL analyst. Authorized to work in the US on F1 OPT.",
                Some("Seeking analyst with Tableau"),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let report: Value = serde_json::from_slice(&body).unwrap();
        assert!(report["f1_score"].as_u64().unwrap() > 30);
        assert!(report["keywords_found"]
            .as_array()
            .unwrap()
            .contains(&json!("Python")));
    }

    #[tokio::test]
    async fn empty_upload_is_unprocessable() {
        let dir = tempfile::tempdir().unwrap();
        let resp = test_app(dir.path())
            .oneshot(upload_request("resume.txt", b"", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let err: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err["error"], NO_TEXT_MESSAGE);
    }

    #[tokio::test]
    async fn upload_without_file_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"job_description\"\r\n\r\nanything\r\n--{BOUNDARY}--\r\n"
        );
        let req = Request::builder()
            .method("POST")
            .uri("/api/resume")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let resp = test_app(dir.path()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
