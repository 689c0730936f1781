use std::time::Duration;

use thiserror::Error;

use crate::dataset::ClinicId;

#[derive(Debug, Error)]
pub enum ClinicsError {
    #[error("Failed to load clinics: {0}")]
    DataLoad(String),

    #[error("Location access denied")]
    GeolocationDenied,

    #[error("Location request timed out after {}s", .0.as_secs())]
    GeolocationTimeout(Duration),

    #[error("Route unavailable: {0}")]
    RouteUnavailable(String),

    #[error("Current location required")]
    LocationRequired,

    #[error("Unknown clinic: {0}")]
    UnknownClinic(ClinicId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
