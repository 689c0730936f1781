use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::city::CityFilter;
use crate::cli::ServeArgs;
use crate::constants::DEFAULT_NEAREST_K;
use crate::dataset::{Clinic, ClinicId, Dataset};
use crate::error::ClinicsError;
use crate::geo::Position;
use crate::query::{FilterState, city_options, nearest_k, stats};
use crate::render::{View, view};
use crate::routing::{OsrmClient, directions_url};
use crate::state::AppState;

#[derive(Clone)]
struct ApiState {
    dataset: Arc<Dataset>,
    session: Arc<Mutex<AppState>>,
    router: Arc<OsrmClient>,
}

pub async fn run(opts: ServeArgs) -> anyhow::Result<()> {
    let outcome = crate::load_dataset(&opts.data).await;
    let app = app(Arc::new(outcome.dataset), outcome.status, OsrmClient::new(opts.osrm_url));

    let addr: SocketAddr = format!("{}:{}", opts.host, opts.port)
        .parse()
        .context("parse host:port")?;

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn app(dataset: Arc<Dataset>, status: String, router: OsrmClient) -> Router {
    let state = ApiState {
        session: Arc::new(Mutex::new(AppState::new(dataset.clone(), status))),
        dataset,
        router: Arc::new(router),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/stats", get(api_stats))
        .route("/api/cities", get(api_cities))
        .route("/api/clinics", get(api_clinics))
        .route("/api/clinics/:id", get(api_clinic_detail))
        .route(
            "/api/clinics/:id/nearest",
            get(api_clinic_nearest).post(api_session_nearest_clinic),
        )
        .route("/api/clinics/:id/directions", get(api_directions))
        .route("/api/clinics/:id/route-origin", post(api_route_origin))
        .route("/api/clinics/:id/route", post(api_route_to))
        .route("/api/nearest", get(api_nearest))
        .route("/api/nearest/me", post(api_nearest_me))
        .route("/api/route", get(api_route))
        .route("/api/view", get(api_view))
        .route("/api/filter", put(api_set_filter))
        .route("/api/location", put(api_set_location))
        .route("/api/panel", axum::routing::delete(api_close_panel))
        .layer(cors)
        .with_state(state)
}

impl IntoResponse for ClinicsError {
    fn into_response(self) -> Response {
        let status = match &self {
            ClinicsError::UnknownClinic(_) => StatusCode::NOT_FOUND,
            ClinicsError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ClinicsError::LocationRequired => StatusCode::CONFLICT,
            ClinicsError::RouteUnavailable(_) => StatusCode::BAD_GATEWAY,
            ClinicsError::GeolocationDenied => StatusCode::FORBIDDEN,
            ClinicsError::GeolocationTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            ClinicsError::DataLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}

async fn api_stats(State(st): State<ApiState>) -> impl IntoResponse {
    let visible = st.dataset.geocoded().count();
    Json(stats(&st.dataset, visible))
}

async fn api_cities(State(st): State<ApiState>) -> impl IntoResponse {
    Json(city_options(&st.dataset))
}

#[derive(Debug, Deserialize)]
struct ClinicSearchParams {
    q: Option<String>,
    city: Option<String>,
}

#[derive(Debug, Serialize)]
struct ClinicListResponse<'a> {
    visible_count: usize,
    clinics: Vec<&'a Clinic>,
}

async fn api_clinics(
    State(st): State<ApiState>,
    Query(p): Query<ClinicSearchParams>,
) -> Response {
    let filter = match parse_filter(p.q, p.city) {
        Ok(f) => f,
        Err(e) => return e.into_response(),
    };
    let clinics = filter.apply(&st.dataset);
    Json(ClinicListResponse {
        visible_count: clinics.len(),
        clinics,
    })
    .into_response()
}

#[derive(Debug, Serialize)]
struct ClinicDetailResponse<'a> {
    clinic: &'a Clinic,
    directions_url: Option<String>,
}

async fn api_clinic_detail(State(st): State<ApiState>, Path(id): Path<ClinicId>) -> Response {
    match st.dataset.require(id) {
        Ok(clinic) => Json(ClinicDetailResponse {
            clinic,
            directions_url: clinic.position().map(directions_url),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct NearestParams {
    at: Option<String>,
    k: Option<usize>,
}

async fn api_clinic_nearest(
    State(st): State<ApiState>,
    Path(id): Path<ClinicId>,
    Query(p): Query<NearestParams>,
) -> Response {
    let origin = match st.dataset.require(id).and_then(|c| {
        c.position()
            .ok_or_else(|| ClinicsError::InvalidInput(format!("clinic {id} has no coordinates")))
    }) {
        Ok(pos) => pos,
        Err(e) => return e.into_response(),
    };
    let k = p.k.unwrap_or(DEFAULT_NEAREST_K);
    Json(nearest_k(st.dataset.iter(), origin, k, Some(id))).into_response()
}

async fn api_nearest(State(st): State<ApiState>, Query(p): Query<NearestParams>) -> Response {
    let Some(at) = p.at.as_deref() else {
        return ClinicsError::InvalidInput("missing at=lat,lng".to_string()).into_response();
    };
    let origin: Position = match at.parse() {
        Ok(pos) => pos,
        Err(e) => return e.into_response(),
    };
    let k = p.k.unwrap_or(DEFAULT_NEAREST_K);
    Json(nearest_k(st.dataset.iter(), origin, k, None)).into_response()
}

#[derive(Debug, Serialize)]
struct DirectionsResponse {
    url: String,
}

async fn api_directions(
    State(st): State<ApiState>,
    Path(id): Path<ClinicId>,
) -> Result<Json<DirectionsResponse>, ClinicsError> {
    let clinic = st.dataset.require(id)?;
    let pos = clinic
        .position()
        .ok_or_else(|| ClinicsError::InvalidInput(format!("clinic {id} has no coordinates")))?;
    Ok(Json(DirectionsResponse {
        url: directions_url(pos),
    }))
}

#[derive(Debug, Deserialize)]
struct RouteParams {
    from: String,
    to: String,
}

async fn api_route(
    State(st): State<ApiState>,
    Query(p): Query<RouteParams>,
) -> Result<impl IntoResponse, ClinicsError> {
    let from: Position = p.from.parse()?;
    let to: Position = p.to.parse()?;
    let route = st.router.route(from, to).await?;
    Ok(Json(route))
}

// Session commands: each mutates the shared dashboard state and answers with
// the re-rendered view.

async fn api_view(State(st): State<ApiState>) -> Json<View> {
    let session = st.session.lock().await;
    Json(view(&session))
}

#[derive(Debug, Deserialize)]
struct FilterBody {
    q: Option<String>,
    city: Option<String>,
}

async fn api_set_filter(
    State(st): State<ApiState>,
    Json(body): Json<FilterBody>,
) -> Result<Json<View>, ClinicsError> {
    let filter = parse_filter(body.q, body.city)?;
    let mut session = st.session.lock().await;
    session.set_filter(filter);
    Ok(Json(view(&session)))
}

async fn api_set_location(
    State(st): State<ApiState>,
    Json(pos): Json<Position>,
) -> Result<Json<View>, ClinicsError> {
    let pos = pos.validate()?;
    let mut session = st.session.lock().await;
    session.set_user_position(pos);
    tracing::info!("User located at {}", pos);
    Ok(Json(view(&session)))
}

#[derive(Debug, Deserialize)]
struct KParams {
    k: Option<usize>,
}

async fn api_nearest_me(
    State(st): State<ApiState>,
    Query(p): Query<KParams>,
) -> Result<Json<View>, ClinicsError> {
    let mut session = st.session.lock().await;
    session.show_nearest_to_user(p.k.unwrap_or(DEFAULT_NEAREST_K))?;
    Ok(Json(view(&session)))
}

async fn api_session_nearest_clinic(
    State(st): State<ApiState>,
    Path(id): Path<ClinicId>,
    Query(p): Query<KParams>,
) -> Result<Json<View>, ClinicsError> {
    let mut session = st.session.lock().await;
    session.show_nearest_to_clinic(id, p.k.unwrap_or(DEFAULT_NEAREST_K))?;
    session.select(id)?;
    Ok(Json(view(&session)))
}

async fn api_route_origin(
    State(st): State<ApiState>,
    Path(id): Path<ClinicId>,
) -> Result<Json<View>, ClinicsError> {
    let mut session = st.session.lock().await;
    session.set_route_origin(id)?;
    Ok(Json(view(&session)))
}

async fn api_route_to(
    State(st): State<ApiState>,
    Path(id): Path<ClinicId>,
) -> Result<Json<View>, ClinicsError> {
    let (ticket, plan) = {
        let mut session = st.session.lock().await;
        let plan = session.plan_route(id)?;
        (session.begin_route(), plan)
    };

    // The lock is released while the routing service is queried.
    let result = st.router.route(plan.from, plan.to).await;

    let mut session = st.session.lock().await;
    session.finish_route(ticket, plan, result)?;
    Ok(Json(view(&session)))
}

async fn api_close_panel(State(st): State<ApiState>) -> Json<View> {
    let mut session = st.session.lock().await;
    session.close_panel();
    Json(view(&session))
}

fn parse_filter(q: Option<String>, city: Option<String>) -> Result<FilterState, ClinicsError> {
    let city: CityFilter = city.as_deref().unwrap_or("all").parse()?;
    Ok(FilterState::new(q.unwrap_or_default(), city))
}
