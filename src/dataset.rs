use std::fmt;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::cache::LocalCache;
use crate::city::{CityCategory, normalize};
use crate::constants::CACHE_KEY;
use crate::download::SourceFetcher;
use crate::error::ClinicsError;
use crate::geo::Position;

/// Identifier assigned once at load time, in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClinicId(pub u32);

impl fmt::Display for ClinicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the geocoded clinics file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicRecord {
    #[serde(rename = "clinic", alias = "name", default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

impl ClinicRecord {
    pub fn position(&self) -> Option<Position> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => {
                Some(Position::new(lat, lng))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clinic {
    pub id: ClinicId,
    #[serde(flatten)]
    pub record: ClinicRecord,
}

impl Clinic {
    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn city(&self) -> Option<&str> {
        self.record.city.as_deref()
    }

    pub fn address(&self) -> Option<&str> {
        self.record.address.as_deref()
    }

    pub fn position(&self) -> Option<Position> {
        self.record.position()
    }

    pub fn is_geocoded(&self) -> bool {
        self.position().is_some()
    }

    pub fn category(&self) -> CityCategory {
        normalize(self.city().unwrap_or(""))
    }
}

/// The loaded clinic list. Read-only after construction.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    clinics: Vec<Clinic>,
}

impl Dataset {
    pub fn from_records(records: Vec<ClinicRecord>) -> Self {
        let clinics = records
            .into_iter()
            .enumerate()
            .map(|(i, record)| Clinic {
                id: ClinicId(i as u32),
                record,
            })
            .collect();
        Self { clinics }
    }

    /// Rebuilds a dataset from clinics that already carry their ids.
    pub fn from_clinics(mut clinics: Vec<Clinic>) -> Self {
        clinics.sort_by_key(|c| c.id);
        clinics.dedup_by_key(|c| c.id);
        Self { clinics }
    }

    pub fn len(&self) -> usize {
        self.clinics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clinics.is_empty()
    }

    /// All records, geocoded or not, in load order.
    pub fn iter(&self) -> std::slice::Iter<'_, Clinic> {
        self.clinics.iter()
    }

    pub fn geocoded(&self) -> impl Iterator<Item = &Clinic> {
        self.clinics.iter().filter(|c| c.is_geocoded())
    }

    pub fn get(&self, id: ClinicId) -> Option<&Clinic> {
        // ids are sorted but may have gaps once ungeocoded records are dropped
        self.clinics
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|i| &self.clinics[i])
    }

    pub fn require(&self, id: ClinicId) -> Result<&Clinic, ClinicsError> {
        self.get(id).ok_or(ClinicsError::UnknownClinic(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOrigin {
    Cache,
    Source,
    Empty,
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub dataset: Dataset,
    pub origin: LoadOrigin,
    pub status: String,
}

/// Loads the clinic list: cached copy first, then the source.
///
/// A successful source load is written back to the cache (geocoded records
/// only). Source failures do not abort start-up; they produce an empty dataset
/// and an error status.
pub async fn load<F: SourceFetcher>(cache: &LocalCache, fetcher: &F, refresh: bool) -> LoadOutcome {
    if !refresh {
        match cache.get(CACHE_KEY) {
            Ok(Some(text)) => {
                if let Some(clinics) = parse_cached(&text) {
                    let dataset = Dataset::from_clinics(clinics);
                    tracing::info!("Loaded {} clinics from cache", dataset.len());
                    return LoadOutcome {
                        status: format!("נטען מהמטמון ({} קליניקות)", dataset.len()),
                        dataset,
                        origin: LoadOrigin::Cache,
                    };
                }
                tracing::warn!("Ignoring invalid cache entry {CACHE_KEY}");
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Cache read failed: {e:#}"),
        }
    }

    match fetch_records(fetcher).await {
        Ok(records) => {
            let dataset = Dataset::from_records(records);
            if let Err(e) = store_cache(cache, &dataset) {
                tracing::warn!("Cache write failed: {e:#}");
            }
            let geocoded = dataset.geocoded().count();
            tracing::info!(
                "Loaded {} clinics from source ({} geocoded)",
                dataset.len(),
                geocoded
            );
            LoadOutcome {
                status: format!("נטענו {geocoded} קליניקות"),
                dataset,
                origin: LoadOrigin::Source,
            }
        }
        Err(e) => {
            let err = ClinicsError::DataLoad(format!("{e:#}"));
            tracing::warn!("{err}");
            LoadOutcome {
                dataset: Dataset::default(),
                origin: LoadOrigin::Empty,
                status: "שגיאה בטעינת נתונים".to_string(),
            }
        }
    }
}

async fn fetch_records<F: SourceFetcher>(fetcher: &F) -> anyhow::Result<Vec<ClinicRecord>> {
    let text = fetcher.fetch().await?;
    serde_json::from_str(&text).context("parse clinics JSON")
}

/// Cached entries keep the id they were given on the source load, so ids
/// survive the ungeocoded records being left out of the cache.
fn parse_cached(text: &str) -> Option<Vec<Clinic>> {
    let clinics: Vec<Clinic> = serde_json::from_str(text).ok()?;
    let first = clinics.first()?;
    first.record.lat.is_some().then_some(clinics)
}

fn store_cache(cache: &LocalCache, dataset: &Dataset) -> anyhow::Result<()> {
    let clinics: Vec<&Clinic> = dataset.geocoded().collect();
    let text = serde_json::to_string(&clinics).context("serialize cache")?;
    cache.set(CACHE_KEY, &text)
}
