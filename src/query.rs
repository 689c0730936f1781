use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::city::{CityCategory, CityFilter};
use crate::dataset::{Clinic, ClinicId, Dataset};
use crate::geo::{Position, haversine_km};

/// Geocoded clinics whose name, city or address contains `query`
/// (case-insensitive). A blank query keeps every geocoded clinic.
pub fn filter_by_text<'a, I>(clinics: I, query: &str) -> Vec<&'a Clinic>
where
    I: IntoIterator<Item = &'a Clinic>,
{
    let needle = query.trim().to_lowercase();
    clinics
        .into_iter()
        .filter(|c| c.is_geocoded())
        .filter(|c| needle.is_empty() || matches_text(c, &needle))
        .collect()
}

fn matches_text(clinic: &Clinic, needle: &str) -> bool {
    let contains = |s: &str| s.to_lowercase().contains(needle);
    contains(clinic.name())
        || clinic.city().is_some_and(contains)
        || clinic.address().is_some_and(contains)
}

/// Geocoded clinics in the given city category; `CityFilter::All` keeps them all.
pub fn filter_by_city<'a, I>(clinics: I, filter: CityFilter) -> Vec<&'a Clinic>
where
    I: IntoIterator<Item = &'a Clinic>,
{
    clinics
        .into_iter()
        .filter(|c| c.is_geocoded())
        .filter(|c| filter.matches(c.category()))
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Nearby<'a> {
    pub clinic: &'a Clinic,
    pub distance_km: f64,
}

/// The `k` geocoded clinics closest to `origin`, nearest first.
///
/// Equal distances keep input order. `exclude` drops one clinic, typically the
/// one the query was issued from.
pub fn nearest_k<'a, I>(
    clinics: I,
    origin: Position,
    k: usize,
    exclude: Option<ClinicId>,
) -> Vec<Nearby<'a>>
where
    I: IntoIterator<Item = &'a Clinic>,
{
    let mut hits: Vec<Nearby<'a>> = clinics
        .into_iter()
        .filter(|c| Some(c.id) != exclude)
        .filter_map(|clinic| {
            let pos = clinic.position()?;
            Some(Nearby {
                clinic,
                distance_km: haversine_km(origin, pos),
            })
        })
        .collect();
    // sort_by is stable
    hits.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    hits.truncate(k);
    hits
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub city: CityFilter,
}

impl FilterState {
    pub fn new(query: impl Into<String>, city: CityFilter) -> Self {
        Self {
            query: query.into(),
            city,
        }
    }

    /// The visible set: city filter, then text filter.
    pub fn apply<'a>(&self, dataset: &'a Dataset) -> Vec<&'a Clinic> {
        let by_city = filter_by_city(dataset.iter(), self.city);
        filter_by_text(by_city, &self.query)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_clinics: usize,
    pub total_cities: usize,
    pub visible_count: usize,
}

pub fn stats(dataset: &Dataset, visible_count: usize) -> Stats {
    Stats {
        total_clinics: dataset.geocoded().count(),
        total_cities: city_options(dataset).len(),
        visible_count,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CityOption {
    pub category: CityCategory,
    pub count: usize,
}

/// Categories present among geocoded clinics, sorted by label.
pub fn city_options(dataset: &Dataset) -> Vec<CityOption> {
    let mut counts: BTreeMap<&'static str, CityOption> = BTreeMap::new();
    for clinic in dataset.geocoded() {
        let category = clinic.category();
        counts
            .entry(category.label())
            .or_insert(CityOption { category, count: 0 })
            .count += 1;
    }
    counts.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ClinicRecord;

    fn record(name: &str, city: &str, address: Option<&str>, pos: Option<(f64, f64)>) -> ClinicRecord {
        ClinicRecord {
            name: name.to_string(),
            city: Some(city.to_string()),
            address: address.map(str::to_string),
            phone: None,
            lat: pos.map(|p| p.0),
            lng: pos.map(|p| p.1),
        }
    }

    fn sample() -> Dataset {
        Dataset::from_records(vec![
            record("רופא משפחה חולון", "חולון", Some("סוקולוב 10"), Some((32.015, 34.779))),
            record("Dental Care", "תל אביב-יפו", Some("Dizengoff 50"), Some((32.080, 34.774))),
            record("רופא ילדים", "בת-ים", None, Some((32.023, 34.751))),
            record("מרפאת שיניים חולון", "חולון", None, Some((32.011, 34.790))),
            record("רופא בלי מיקום", "חולון", None, None),
        ])
    }

    fn names(clinics: &[&Clinic]) -> Vec<String> {
        clinics.iter().map(|c| c.name().to_string()).collect()
    }

    #[test]
    fn empty_query_returns_geocoded_records() {
        let ds = sample();
        let all = filter_by_text(ds.iter(), "  ");
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|c| c.is_geocoded()));
    }

    #[test]
    fn text_filter_is_case_insensitive_over_name_city_address() {
        let ds = sample();
        assert_eq!(names(&filter_by_text(ds.iter(), "dental")), vec!["Dental Care"]);
        assert_eq!(names(&filter_by_text(ds.iter(), "DIZENGOFF")), vec!["Dental Care"]);
        assert_eq!(filter_by_text(ds.iter(), "בת-ים").len(), 1);
        assert!(filter_by_text(ds.iter(), "nothing like this").is_empty());
    }

    #[test]
    fn city_filter_matches_normalized_category() {
        let ds = sample();
        let holon = filter_by_city(ds.iter(), CityFilter::Only(CityCategory::Holon));
        assert_eq!(holon.len(), 2);
        assert!(holon.iter().all(|c| c.category() == CityCategory::Holon));

        let tel_aviv = filter_by_city(ds.iter(), CityFilter::Only(CityCategory::TelAviv));
        assert_eq!(names(&tel_aviv), vec!["Dental Care"]);

        assert_eq!(filter_by_city(ds.iter(), CityFilter::All).len(), 4);
    }

    #[test]
    fn composed_filter_requires_both_predicates() {
        let ds = sample();
        let f = FilterState::new("רופא", CityFilter::Only(CityCategory::Holon));
        assert_eq!(names(&f.apply(&ds)), vec!["רופא משפחה חולון"]);
    }

    #[test]
    fn nearest_k_returns_two_closest_in_order() {
        let ds = Dataset::from_records(vec![
            record("far", "חולון", None, Some((32.30, 34.90))),
            record("near", "חולון", None, Some((32.001, 34.001))),
            record("mid", "חולון", None, Some((32.05, 34.05))),
        ]);
        let hits = nearest_k(ds.iter(), Position::new(32.0, 34.0), 2, None);
        let got: Vec<&str> = hits.iter().map(|h| h.clinic.name()).collect();
        assert_eq!(got, vec!["near", "mid"]);
        assert!(hits[0].distance_km <= hits[1].distance_km);
    }

    #[test]
    fn nearest_k_excludes_self_and_ungeocoded() {
        let ds = sample();
        let origin = ds.get(ClinicId(0)).unwrap().position().unwrap();
        let hits = nearest_k(ds.iter(), origin, 10, Some(ClinicId(0)));
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.clinic.id != ClinicId(0)));
        assert!(hits.iter().all(|h| h.clinic.is_geocoded()));
        assert!(hits.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
    }

    #[test]
    fn nearest_k_breaks_ties_by_dataset_order() {
        let ds = Dataset::from_records(vec![
            record("first", "יפו", None, Some((32.01, 34.0))),
            record("second", "יפו", None, Some((32.01, 34.0))),
        ]);
        let hits = nearest_k(ds.iter(), Position::new(32.0, 34.0), 5, None);
        let got: Vec<&str> = hits.iter().map(|h| h.clinic.name()).collect();
        assert_eq!(got, vec!["first", "second"]);
    }

    #[test]
    fn nearest_k_zero_is_empty() {
        let ds = sample();
        assert!(nearest_k(ds.iter(), Position::new(32.0, 34.7), 0, None).is_empty());
    }

    #[test]
    fn stats_and_city_options() {
        let ds = sample();
        let visible = FilterState::default().apply(&ds).len();
        let s = stats(&ds, visible);
        assert_eq!(s.total_clinics, 4);
        assert_eq!(s.total_cities, 3);
        assert_eq!(s.visible_count, 4);

        let opts = city_options(&ds);
        let holon = opts
            .iter()
            .find(|o| o.category == CityCategory::Holon)
            .unwrap();
        assert_eq!(holon.count, 2);
        let labels: Vec<&str> = opts.iter().map(|o| o.category.label()).collect();
        let mut sorted = labels.clone();
        sorted.sort();
        assert_eq!(labels, sorted);
    }
}
