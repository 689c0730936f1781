pub mod cache;
pub mod city;
pub mod cli;
pub mod commands;
pub mod constants;
pub mod dataset;
pub mod download;
pub mod error;
pub mod geo;
pub mod geolocation;
pub mod query;
pub mod render;
pub mod routing;
pub mod server;
pub mod state;
pub mod storage;

use crate::cache::LocalCache;
use crate::cli::DataArgs;
use crate::dataset::LoadOutcome;
use crate::download::{DataSource, SourceFetch};
use crate::storage::StoragePaths;

/// Loads the clinic dataset described by the shared data flags.
pub async fn load_dataset(opts: &DataArgs) -> LoadOutcome {
    let paths = StoragePaths::new(&opts.data_dir);
    let cache = LocalCache::new(&paths.cache_dir);
    let fetcher = SourceFetch {
        source: DataSource::from(opts.source.as_str()),
        paths,
        force_download: opts.force_download,
    };
    dataset::load(&cache, &fetcher, opts.refresh).await
}
