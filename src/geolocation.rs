use std::future::Future;
use std::time::Duration;

use crate::error::ClinicsError;
use crate::geo::Position;

pub trait Geolocator {
    fn current_position(&self) -> impl Future<Output = Result<Position, ClinicsError>> + Send;
}

/// Answers with a preconfigured fix; with none configured, access is denied.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedGeolocator {
    position: Option<Position>,
}

impl FixedGeolocator {
    pub fn new(position: Option<Position>) -> Self {
        Self { position }
    }
}

impl Geolocator for FixedGeolocator {
    async fn current_position(&self) -> Result<Position, ClinicsError> {
        self.position.ok_or(ClinicsError::GeolocationDenied)
    }
}

/// One position request, failing with `GeolocationTimeout` once `timeout` elapses.
pub async fn locate<G: Geolocator>(geolocator: &G, timeout: Duration) -> Result<Position, ClinicsError> {
    match tokio::time::timeout(timeout, geolocator.current_position()).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Geolocation timed out after {:?}", timeout);
            Err(ClinicsError::GeolocationTimeout(timeout))
        }
    }
}
