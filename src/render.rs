//! Render descriptors handed to the map and list renderers.
//!
//! [`view`] is a pure projection of [`AppState`]; the renderers never look at
//! the state directly.

use std::collections::HashSet;

use serde::Serialize;

use crate::city::{CityStyle, city_style};
use crate::constants::{DEFAULT_CENTER_LAT, DEFAULT_CENTER_LNG, DEFAULT_ZOOM};
use crate::dataset::{Clinic, ClinicId};
use crate::geo::{Position, format_distance, haversine_km};
use crate::query::{CityOption, FilterState, Stats, city_options, stats};
use crate::state::{AppState, Panel};

#[derive(Debug, Clone, Serialize)]
pub struct View {
    pub status: String,
    pub map: MapDefaults,
    pub filter: FilterState,
    pub stats: Stats,
    pub cities: Vec<CityOption>,
    pub user_position: Option<Position>,
    pub route_origin: Option<ClinicId>,
    pub markers: Vec<MarkerDescriptor>,
    pub list: Vec<ListEntry>,
    pub panel: PanelView,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MapDefaults {
    pub center: Position,
    pub zoom: u8,
}

impl Default for MapDefaults {
    fn default() -> Self {
        Self {
            center: Position::new(DEFAULT_CENTER_LAT, DEFAULT_CENTER_LNG),
            zoom: DEFAULT_ZOOM,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkerDescriptor {
    pub id: ClinicId,
    pub name: String,
    pub position: Position,
    pub style: CityStyle,
    pub popup: PopupDescriptor,
}

#[derive(Debug, Clone, Serialize)]
pub struct PopupDescriptor {
    pub title: String,
    pub location: String,
    pub phone: Option<String>,
    pub distance: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub id: ClinicId,
    pub name: String,
    pub subtitle: String,
    pub class: &'static str,
    pub distance: Option<String>,
    pub nearest: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PanelView {
    Hidden,
    Nearest {
        from_name: String,
        summary: String,
        entries: Vec<NearestView>,
    },
    Route {
        from_name: String,
        to_name: String,
        distance: String,
        time: String,
        path: Vec<Position>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct NearestView {
    pub id: ClinicId,
    pub name: String,
    pub distance: String,
}

pub fn view(state: &AppState) -> View {
    let dataset = state.dataset();
    let visible = state.visible();
    let user = state.user_position();

    let nearest_ids: HashSet<ClinicId> = match state.panel() {
        Panel::Nearest { hits, .. } => hits.iter().map(|h| h.id).collect(),
        _ => HashSet::new(),
    };

    let markers = visible.iter().filter_map(|c| marker(c, user)).collect();
    let list = visible
        .iter()
        .filter_map(|c| {
            let pos = c.position()?;
            Some(ListEntry {
                id: c.id,
                name: c.name().to_string(),
                subtitle: subtitle(c),
                class: city_style(c.city()).class,
                distance: user.map(|u| format_distance(haversine_km(u, pos))),
                nearest: nearest_ids.contains(&c.id),
                selected: state.selected() == Some(c.id),
            })
        })
        .collect();

    let panel = match state.panel() {
        Panel::Hidden => PanelView::Hidden,
        Panel::Nearest {
            from_name, hits, ..
        } => PanelView::Nearest {
            from_name: from_name.clone(),
            summary: format!("{} קליניקות קרובות", hits.len()),
            entries: hits
                .iter()
                .filter_map(|h| {
                    let clinic = dataset.get(h.id)?;
                    Some(NearestView {
                        id: h.id,
                        name: clinic.name().to_string(),
                        distance: format_distance(h.distance_km),
                    })
                })
                .collect(),
        },
        Panel::Route {
            from_name,
            to_name,
            route,
        } => PanelView::Route {
            from_name: from_name.clone(),
            to_name: to_name.clone(),
            distance: format!("{:.1} ק\"מ", route.distance_km()),
            time: format!("{} דקות", route.duration_minutes()),
            path: route.path.clone(),
        },
    };

    View {
        status: state.status().to_string(),
        map: MapDefaults::default(),
        filter: state.filter().clone(),
        stats: stats(dataset, visible.len()),
        cities: city_options(dataset),
        user_position: user,
        route_origin: state.route_origin(),
        markers,
        list,
        panel,
    }
}

pub fn marker(clinic: &Clinic, user: Option<Position>) -> Option<MarkerDescriptor> {
    let position = clinic.position()?;
    Some(MarkerDescriptor {
        id: clinic.id,
        name: clinic.name().to_string(),
        position,
        style: city_style(clinic.city()),
        popup: PopupDescriptor {
            title: clinic.name().to_string(),
            location: subtitle(clinic),
            phone: clinic.record.phone.clone(),
            distance: user.map(|u| format!("{} ממך", format_distance(haversine_km(u, position)))),
        },
    })
}

fn subtitle(clinic: &Clinic) -> String {
    clinic
        .address()
        .filter(|a| !a.is_empty())
        .or(clinic.city())
        .unwrap_or_default()
        .to_string()
}
