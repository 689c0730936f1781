use serde::{Deserialize, Serialize};

use crate::constants::GOOGLE_MAPS_DIRECTIONS_URL;
use crate::error::ClinicsError;
use crate::geo::Position;

/// A driving route as returned by the routing service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub distance_m: f64,
    pub duration_s: f64,
    pub path: Vec<Position>,
}

impl Route {
    pub fn distance_km(&self) -> f64 {
        self.distance_m / 1000.0
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.duration_s / 60.0).round() as i64
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    // GeoJSON order: [lng, lat]
    coordinates: Vec<[f64; 2]>,
}

/// Client for the OSRM `route` service. One request per call, no retries.
#[derive(Debug, Clone)]
pub struct OsrmClient {
    http: reqwest::Client,
    base_url: String,
}

impl OsrmClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn route_url(&self, from: Position, to: Position) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, from.lng, from.lat, to.lng, to.lat
        )
    }

    pub async fn route(&self, from: Position, to: Position) -> Result<Route, ClinicsError> {
        let url = self.route_url(from, to);
        tracing::info!("Requesting route {} -> {}", from, to);

        let resp = self.http.get(&url).send().await.map_err(|e| {
            tracing::warn!("Routing request failed: {e}");
            ClinicsError::RouteUnavailable(format!("request failed: {e}"))
        })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!("Routing service returned {status}");
            return Err(ClinicsError::RouteUnavailable(format!(
                "routing service returned {status}"
            )));
        }

        let body: OsrmResponse = resp.json().await.map_err(|e| {
            tracing::warn!("Routing response unreadable: {e}");
            ClinicsError::RouteUnavailable(format!("unreadable response: {e}"))
        })?;

        parse_route(body)
    }
}

fn parse_route(body: OsrmResponse) -> Result<Route, ClinicsError> {
    if body.code != "Ok" {
        return Err(ClinicsError::RouteUnavailable(format!(
            "routing service answered {}",
            body.code
        )));
    }
    let Some(route) = body.routes.into_iter().next() else {
        return Err(ClinicsError::RouteUnavailable(
            "no route in response".to_string(),
        ));
    };
    let path = route
        .geometry
        .coordinates
        .into_iter()
        .map(|[lng, lat]| Position::new(lat, lng))
        .collect();
    Ok(Route {
        distance_m: route.distance,
        duration_s: route.duration,
        path,
    })
}

/// Link that opens driving directions to `destination` in Google Maps.
pub fn directions_url(destination: Position) -> String {
    format!(
        "{GOOGLE_MAPS_DIRECTIONS_URL}?api=1&destination={},{}",
        destination.lat, destination.lng
    )
}
