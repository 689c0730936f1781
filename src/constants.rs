pub const DEFAULT_OSRM_BASE_URL: &str = "https://router.project-osrm.org";
pub const GOOGLE_MAPS_DIRECTIONS_URL: &str = "https://www.google.com/maps/dir/";

pub const DEFAULT_SOURCE_FILE: &str = "clinics_geocoded.json";
pub const CACHE_KEY: &str = "clinicsGPS_data";

pub const DEFAULT_NEAREST_K: usize = 5;
pub const GEOLOCATION_TIMEOUT_SECS: u64 = 10;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

// Dashboard defaults handed to the map renderer (Tel Aviv).
pub const DEFAULT_CENTER_LAT: f64 = 32.07;
pub const DEFAULT_CENTER_LNG: f64 = 34.78;
pub const DEFAULT_ZOOM: u8 = 12;
