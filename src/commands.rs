use std::time::Duration;

use anyhow::Context;
use serde::Serialize;

use crate::city::CityFilter;
use crate::cli::{DataArgs, DirectionsArgs, NearestArgs, RouteArgs, SearchArgs};
use crate::constants::GEOLOCATION_TIMEOUT_SECS;
use crate::dataset::{ClinicId, Dataset, LoadOutcome};
use crate::geo::Position;
use crate::geolocation::{FixedGeolocator, locate};
use crate::query::{FilterState, Nearby, city_options, nearest_k};
use crate::routing::{OsrmClient, directions_url};

fn print_json(v: &impl Serialize) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(v).context("serialize output")?;
    println!("{s}");
    Ok(())
}

async fn load(opts: &DataArgs) -> LoadOutcome {
    let outcome = crate::load_dataset(opts).await;
    tracing::info!("{}", outcome.status);
    outcome
}

pub async fn search(opts: SearchArgs) -> anyhow::Result<()> {
    let city: CityFilter = opts.city.parse()?;
    let outcome = load(&opts.data).await;
    let filter = FilterState::new(opts.q, city);
    let visible = filter.apply(&outcome.dataset);
    tracing::info!("{} clinics match", visible.len());
    print_json(&visible)
}

pub async fn cities(opts: DataArgs) -> anyhow::Result<()> {
    let outcome = load(&opts).await;
    print_json(&city_options(&outcome.dataset))
}

pub async fn nearest(opts: NearestArgs) -> anyhow::Result<()> {
    let outcome = load(&opts.data).await;
    print_json(&nearest_hits(&outcome.dataset, &opts).await?)
}

async fn nearest_hits<'a>(
    dataset: &'a Dataset,
    opts: &NearestArgs,
) -> anyhow::Result<Vec<Nearby<'a>>> {
    let (origin, exclude) = match opts.clinic_id() {
        Some(id) => (clinic_position(dataset, id)?, Some(id)),
        None => {
            let geolocator = FixedGeolocator::new(opts.at);
            let pos = locate(&geolocator, Duration::from_secs(GEOLOCATION_TIMEOUT_SECS)).await?;
            (pos, None)
        }
    };
    Ok(nearest_k(dataset.iter(), origin, opts.k, exclude))
}

fn clinic_position(dataset: &Dataset, id: ClinicId) -> anyhow::Result<Position> {
    dataset
        .require(id)?
        .position()
        .with_context(|| format!("clinic {id} has no coordinates"))
}

pub async fn route(opts: RouteArgs) -> anyhow::Result<()> {
    let client = OsrmClient::new(opts.osrm_url);
    let route = client.route(opts.from, opts.to).await?;
    tracing::info!(
        "Route: {:.1} km, {} min",
        route.distance_km(),
        route.duration_minutes()
    );
    print_json(&route)
}

#[derive(Debug, Serialize)]
struct DirectionsOutput<'a> {
    id: ClinicId,
    name: &'a str,
    url: String,
}

pub async fn directions(opts: DirectionsArgs) -> anyhow::Result<()> {
    let outcome = load(&opts.data).await;
    print_json(&directions_for(&outcome.dataset, ClinicId(opts.clinic))?)
}

fn directions_for(dataset: &Dataset, id: ClinicId) -> anyhow::Result<DirectionsOutput<'_>> {
    let pos = clinic_position(dataset, id)?;
    let clinic = dataset.require(id)?;
    Ok(DirectionsOutput {
        id,
        name: clinic.name(),
        url: directions_url(pos),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::LoadOrigin;

    const SOURCE: &str = r#"[
        {"clinic": "מרפאה א", "city": "חולון", "lat": 32.010, "lng": 34.770},
        {"clinic": "ללא מיקום", "city": "חולון", "lat": null, "lng": null},
        {"clinic": "מרפאה ג", "city": "חולון", "lat": 32.020, "lng": 34.780},
        {"clinic": "מרפאה ד", "city": "בת ים", "lat": 32.030, "lng": 34.750}
    ]"#;

    fn data_args(dir: &std::path::Path) -> DataArgs {
        let source = dir.join("clinics_geocoded.json");
        std::fs::write(&source, SOURCE).unwrap();
        DataArgs {
            data_dir: dir.join("data").display().to_string(),
            source: source.display().to_string(),
            refresh: false,
            force_download: false,
        }
    }

    fn nearest_args(data: DataArgs, clinic: u32) -> NearestArgs {
        NearestArgs {
            data,
            at: None,
            clinic: Some(clinic),
            k: 5,
        }
    }

    fn hit_ids(hits: &[Nearby<'_>]) -> Vec<u32> {
        hits.iter().map(|h| h.clinic.id.0).collect()
    }

    #[tokio::test]
    async fn clinic_ids_mean_the_same_on_every_run() {
        let dir = tempfile::tempdir().unwrap();
        let args = data_args(dir.path());

        let first = crate::load_dataset(&args).await;
        let second = crate::load_dataset(&args).await;
        assert_eq!(first.origin, LoadOrigin::Source);
        assert_eq!(second.origin, LoadOrigin::Cache);

        for outcome in [&first, &second] {
            let hits = nearest_hits(&outcome.dataset, &nearest_args(args.clone(), 2))
                .await
                .unwrap();
            assert_eq!(hit_ids(&hits), vec![0, 3]);

            let out = directions_for(&outcome.dataset, ClinicId(3)).unwrap();
            assert_eq!(out.name, "מרפאה ד");
            assert_eq!(
                out.url,
                "https://www.google.com/maps/dir/?api=1&destination=32.03,34.75"
            );
        }
    }

    #[tokio::test]
    async fn nearest_from_position_keeps_every_clinic() {
        let dir = tempfile::tempdir().unwrap();
        let args = data_args(dir.path());
        let outcome = crate::load_dataset(&args).await;

        let opts = NearestArgs {
            at: Some(Position::new(32.011, 34.771)),
            clinic: None,
            k: 2,
            data: args,
        };
        let hits = nearest_hits(&outcome.dataset, &opts).await.unwrap();
        assert_eq!(hit_ids(&hits), vec![0, 2]);
    }

    #[tokio::test]
    async fn ungeocoded_or_unknown_clinic_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = data_args(dir.path());
        let outcome = crate::load_dataset(&args).await;

        assert!(directions_for(&outcome.dataset, ClinicId(1)).is_err());
        assert!(directions_for(&outcome.dataset, ClinicId(42)).is_err());
        assert!(
            nearest_hits(&outcome.dataset, &nearest_args(args, 1))
                .await
                .is_err()
        );
    }
}
