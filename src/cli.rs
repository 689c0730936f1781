use clap::{Parser, Subcommand};

use crate::constants::{DEFAULT_NEAREST_K, DEFAULT_OSRM_BASE_URL, DEFAULT_SOURCE_FILE};
use crate::dataset::ClinicId;
use crate::geo::Position;

const DEFAULT_DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data");

#[derive(Parser, Debug)]
#[command(name = "clinics-gps")]
#[command(about = "Clinic locator: search, nearest clinics and driving routes", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the dashboard HTTP API.
    Serve(ServeArgs),
    /// List geocoded clinics matching a text query and/or city.
    Search(SearchArgs),
    /// List city categories with clinic counts.
    Cities(DataArgs),
    /// Nearest clinics to a position or to another clinic.
    Nearest(NearestArgs),
    /// Driving route between two positions.
    Route(RouteArgs),
    /// External maps directions link for a clinic.
    Directions(DirectionsArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct DataArgs {
    /// Data directory (downloaded source, cache).
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: String,

    /// Geocoded clinics JSON: a local path or an http(s) URL.
    #[arg(long, default_value = DEFAULT_SOURCE_FILE)]
    pub source: String,

    /// Ignore the cached dataset and reload from the source.
    #[arg(long)]
    pub refresh: bool,

    /// Re-download a URL source even if a local copy exists.
    #[arg(long)]
    pub force_download: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// OSRM base URL.
    #[arg(long, default_value = DEFAULT_OSRM_BASE_URL)]
    pub osrm_url: String,

    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 8788)]
    pub port: u16,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Case-insensitive text matched against name, city and address.
    #[arg(long, default_value = "")]
    pub q: String,

    /// City category label, or "all".
    #[arg(long, default_value = "all")]
    pub city: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct NearestArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Reference position as lat,lng (your location).
    #[arg(long, conflicts_with = "clinic", required_unless_present = "clinic")]
    pub at: Option<Position>,

    /// Reference clinic id; the clinic itself is left out of the results.
    #[arg(long)]
    pub clinic: Option<u32>,

    #[arg(long, default_value_t = DEFAULT_NEAREST_K)]
    pub k: usize,
}

impl NearestArgs {
    pub fn clinic_id(&self) -> Option<ClinicId> {
        self.clinic.map(ClinicId)
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct RouteArgs {
    /// Origin as lat,lng.
    #[arg(long)]
    pub from: Position,

    /// Destination as lat,lng.
    #[arg(long)]
    pub to: Position,

    /// OSRM base URL.
    #[arg(long, default_value = DEFAULT_OSRM_BASE_URL)]
    pub osrm_url: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DirectionsArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[arg(long)]
    pub clinic: u32,
}
