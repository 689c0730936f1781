use std::sync::Arc;

use serde::Serialize;

use crate::city::CityFilter;
use crate::dataset::{Clinic, ClinicId, Dataset};
use crate::error::ClinicsError;
use crate::geo::Position;
use crate::query::{FilterState, nearest_k};
use crate::routing::Route;

pub const MY_LOCATION_LABEL: &str = "המיקום שלי";

/// Issued when an async request (locate, route) starts. Only the newest
/// ticket of each kind may apply its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
struct Generation {
    issued: u64,
}

impl Generation {
    fn next(&mut self) -> Ticket {
        self.issued += 1;
        Ticket(self.issued)
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.issued
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// A newer request was issued; the result was dropped.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearestEntry {
    pub id: ClinicId,
    pub distance_km: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Panel {
    #[default]
    Hidden,
    Nearest {
        from_name: String,
        origin: Position,
        hits: Vec<NearestEntry>,
    },
    Route {
        from_name: String,
        to_name: String,
        route: Route,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutePlan {
    pub from: Position,
    pub to: Position,
    pub from_name: String,
    pub to_name: String,
}

/// Everything the dashboard session knows. Rendering reads it through
/// [`crate::render::view`]; nothing else mutates it.
#[derive(Debug)]
pub struct AppState {
    dataset: Arc<Dataset>,
    filter: FilterState,
    user_position: Option<Position>,
    selected: Option<ClinicId>,
    route_origin: Option<ClinicId>,
    panel: Panel,
    status: String,
    locate_gen: Generation,
    route_gen: Generation,
}

impl AppState {
    pub fn new(dataset: Arc<Dataset>, status: impl Into<String>) -> Self {
        Self {
            dataset,
            filter: FilterState::default(),
            user_position: None,
            selected: None,
            route_origin: None,
            panel: Panel::Hidden,
            status: status.into(),
            locate_gen: Generation::default(),
            route_gen: Generation::default(),
        }
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn user_position(&self) -> Option<Position> {
        self.user_position
    }

    pub fn selected(&self) -> Option<ClinicId> {
        self.selected
    }

    pub fn route_origin(&self) -> Option<ClinicId> {
        self.route_origin
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn visible(&self) -> Vec<&Clinic> {
        self.filter.apply(&self.dataset)
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.filter.query = query.into();
    }

    pub fn set_city_filter(&mut self, city: CityFilter) {
        self.filter.city = city;
    }

    pub fn set_filter(&mut self, filter: FilterState) {
        self.filter = filter;
    }

    pub fn select(&mut self, id: ClinicId) -> Result<(), ClinicsError> {
        self.geocoded_clinic(id)?;
        self.selected = Some(id);
        Ok(())
    }

    pub fn begin_locate(&mut self) -> Ticket {
        self.locate_gen.next()
    }

    pub fn finish_locate(
        &mut self,
        ticket: Ticket,
        result: Result<Position, ClinicsError>,
    ) -> Result<Applied, ClinicsError> {
        if !self.locate_gen.is_current(ticket) {
            tracing::debug!("Dropping stale location result {:?}", ticket);
            return Ok(Applied::Stale);
        }
        self.user_position = Some(result?);
        Ok(Applied::Applied)
    }

    /// Locate with a fix that is already known. The HTTP server takes this
    /// path: the browser resolves the position and sends it in.
    pub fn set_user_position(&mut self, position: Position) {
        let ticket = self.begin_locate();
        match self.finish_locate(ticket, Ok(position)) {
            Ok(Applied::Applied) => {}
            Ok(Applied::Stale) | Err(_) => {
                tracing::warn!("Location {} was not applied", position);
            }
        }
    }

    pub fn show_nearest_to_user(&mut self, k: usize) -> Result<(), ClinicsError> {
        let origin = self.user_position.ok_or(ClinicsError::LocationRequired)?;
        self.show_nearest(origin, MY_LOCATION_LABEL.to_string(), k, None);
        Ok(())
    }

    pub fn show_nearest_to_clinic(&mut self, id: ClinicId, k: usize) -> Result<(), ClinicsError> {
        let (name, origin) = self.geocoded_clinic(id)?;
        self.show_nearest(origin, name, k, Some(id));
        Ok(())
    }

    fn show_nearest(&mut self, origin: Position, from_name: String, k: usize, exclude: Option<ClinicId>) {
        let hits = nearest_k(self.dataset.iter(), origin, k, exclude)
            .into_iter()
            .map(|n| NearestEntry {
                id: n.clinic.id,
                distance_km: n.distance_km,
            })
            .collect();
        self.panel = Panel::Nearest {
            from_name,
            origin,
            hits,
        };
    }

    pub fn set_route_origin(&mut self, id: ClinicId) -> Result<(), ClinicsError> {
        self.geocoded_clinic(id)?;
        self.route_origin = Some(id);
        Ok(())
    }

    /// Resolves the endpoints of a route to clinic `to`: from the pending route
    /// origin if one was picked (it is consumed), else from the user position.
    pub fn plan_route(&mut self, to: ClinicId) -> Result<RoutePlan, ClinicsError> {
        let (to_name, to_pos) = self.geocoded_clinic(to)?;
        let (from_name, from) = match self.route_origin {
            Some(origin) => {
                let from = self.geocoded_clinic(origin)?;
                self.route_origin = None;
                from
            }
            None => {
                let pos = self.user_position.ok_or(ClinicsError::LocationRequired)?;
                (MY_LOCATION_LABEL.to_string(), pos)
            }
        };
        Ok(RoutePlan {
            from,
            to: to_pos,
            from_name,
            to_name,
        })
    }

    pub fn begin_route(&mut self) -> Ticket {
        self.route_gen.next()
    }

    /// Applies a routing result. Failures leave the state, including any route
    /// already on screen, untouched.
    pub fn finish_route(
        &mut self,
        ticket: Ticket,
        plan: RoutePlan,
        result: Result<Route, ClinicsError>,
    ) -> Result<Applied, ClinicsError> {
        if !self.route_gen.is_current(ticket) {
            tracing::debug!("Dropping stale route result {:?}", ticket);
            return Ok(Applied::Stale);
        }
        let route = result?;
        self.panel = Panel::Route {
            from_name: plan.from_name,
            to_name: plan.to_name,
            route,
        };
        Ok(Applied::Applied)
    }

    pub fn close_panel(&mut self) {
        self.panel = Panel::Hidden;
    }

    fn geocoded_clinic(&self, id: ClinicId) -> Result<(String, Position), ClinicsError> {
        let clinic = self.dataset.require(id)?;
        let pos = clinic.position().ok_or_else(|| {
            ClinicsError::InvalidInput(format!("clinic {id} has no coordinates"))
        })?;
        Ok((clinic.name().to_string(), pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::CityCategory;
    use crate::dataset::ClinicRecord;

    fn clinic(name: &str, city: &str, pos: Option<(f64, f64)>) -> ClinicRecord {
        ClinicRecord {
            name: name.to_string(),
            city: Some(city.to_string()),
            address: None,
            phone: None,
            lat: pos.map(|p| p.0),
            lng: pos.map(|p| p.1),
        }
    }

    fn state() -> AppState {
        let ds = Dataset::from_records(vec![
            clinic("A", "חולון", Some((32.010, 34.770))),
            clinic("B", "חולון", Some((32.020, 34.780))),
            clinic("C", "בת ים", Some((32.030, 34.750))),
            clinic("D", "חולון", None),
        ]);
        AppState::new(Arc::new(ds), "ready")
    }

    fn route(distance_m: f64) -> Route {
        Route {
            distance_m,
            duration_s: 120.0,
            path: vec![Position::new(32.0, 34.7), Position::new(32.1, 34.8)],
        }
    }

    #[test]
    fn filter_updates_change_visible_set_only() {
        let mut st = state();
        assert_eq!(st.visible().len(), 3);
        st.set_city_filter(CityFilter::Only(CityCategory::Holon));
        assert_eq!(st.visible().len(), 2);
        st.set_query("B");
        assert_eq!(st.visible().len(), 1);
        assert_eq!(st.dataset().len(), 4);
    }

    #[test]
    fn stale_location_is_dropped() {
        let mut st = state();
        let first = st.begin_locate();
        let second = st.begin_locate();

        let p2 = Position::new(32.05, 34.76);
        assert_eq!(st.finish_locate(second, Ok(p2)).unwrap(), Applied::Applied);
        let late = st.finish_locate(first, Ok(Position::new(0.0, 0.0))).unwrap();
        assert_eq!(late, Applied::Stale);
        assert_eq!(st.user_position(), Some(p2));
    }

    #[test]
    fn known_fix_supersedes_pending_locate() {
        let mut st = state();
        let pending = st.begin_locate();
        let known = Position::new(32.02, 34.77);
        st.set_user_position(known);

        let late = st.finish_locate(pending, Ok(Position::new(31.0, 35.0))).unwrap();
        assert_eq!(late, Applied::Stale);
        assert_eq!(st.user_position(), Some(known));
    }

    #[test]
    fn failed_location_keeps_previous_fix() {
        let mut st = state();
        let p = Position::new(32.0, 34.7);
        st.set_user_position(p);
        let t = st.begin_locate();
        let err = st.finish_locate(t, Err(ClinicsError::GeolocationDenied));
        assert!(matches!(err, Err(ClinicsError::GeolocationDenied)));
        assert_eq!(st.user_position(), Some(p));
    }

    #[test]
    fn nearest_to_user_requires_location() {
        let mut st = state();
        assert!(matches!(
            st.show_nearest_to_user(5),
            Err(ClinicsError::LocationRequired)
        ));
        st.set_user_position(Position::new(32.011, 34.771));
        st.show_nearest_to_user(2).unwrap();
        let Panel::Nearest { from_name, hits, .. } = st.panel() else {
            panic!("expected nearest panel");
        };
        assert_eq!(from_name, MY_LOCATION_LABEL);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, ClinicId(0));
    }

    #[test]
    fn nearest_to_clinic_excludes_itself() {
        let mut st = state();
        st.show_nearest_to_clinic(ClinicId(0), 5).unwrap();
        let Panel::Nearest { from_name, hits, .. } = st.panel() else {
            panic!("expected nearest panel");
        };
        assert_eq!(from_name, "A");
        let ids: Vec<ClinicId> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![ClinicId(1), ClinicId(2)]);
    }

    #[test]
    fn ungeocoded_clinics_cannot_be_selected_or_routed() {
        let mut st = state();
        assert!(st.select(ClinicId(3)).is_err());
        assert!(st.set_route_origin(ClinicId(3)).is_err());
        assert!(matches!(
            st.select(ClinicId(42)),
            Err(ClinicsError::UnknownClinic(_))
        ));
    }

    #[test]
    fn route_plan_prefers_and_consumes_route_origin() {
        let mut st = state();
        st.set_user_position(Position::new(32.0, 34.7));
        st.set_route_origin(ClinicId(0)).unwrap();

        let plan = st.plan_route(ClinicId(2)).unwrap();
        assert_eq!(plan.from_name, "A");
        assert_eq!(plan.to_name, "C");
        assert_eq!(st.route_origin(), None);

        let plan = st.plan_route(ClinicId(2)).unwrap();
        assert_eq!(plan.from_name, MY_LOCATION_LABEL);
    }

    #[test]
    fn route_plan_without_origin_or_location_fails() {
        let mut st = state();
        assert!(matches!(
            st.plan_route(ClinicId(1)),
            Err(ClinicsError::LocationRequired)
        ));
    }

    #[test]
    fn failed_route_leaves_previous_route_in_place() {
        let mut st = state();
        st.set_user_position(Position::new(32.0, 34.7));

        let plan = st.plan_route(ClinicId(1)).unwrap();
        let t = st.begin_route();
        st.finish_route(t, plan.clone(), Ok(route(1500.0))).unwrap();
        let before = st.panel().clone();

        let t = st.begin_route();
        let err = st.finish_route(
            t,
            plan,
            Err(ClinicsError::RouteUnavailable("code Error".into())),
        );
        assert!(matches!(err, Err(ClinicsError::RouteUnavailable(_))));
        assert_eq!(st.panel(), &before);
        assert_eq!(st.user_position(), Some(Position::new(32.0, 34.7)));
    }

    #[test]
    fn only_latest_route_request_applies() {
        let mut st = state();
        st.set_user_position(Position::new(32.0, 34.7));
        let plan = st.plan_route(ClinicId(1)).unwrap();

        let old = st.begin_route();
        let new = st.begin_route();
        st.finish_route(new, plan.clone(), Ok(route(2000.0))).unwrap();
        let late = st.finish_route(old, plan, Ok(route(9999.0))).unwrap();

        assert_eq!(late, Applied::Stale);
        let Panel::Route { route, .. } = st.panel() else {
            panic!("expected route panel");
        };
        assert_eq!(route.distance_m, 2000.0);
    }

    #[test]
    fn close_panel_drops_route() {
        let mut st = state();
        st.set_user_position(Position::new(32.0, 34.7));
        let plan = st.plan_route(ClinicId(1)).unwrap();
        let t = st.begin_route();
        st.finish_route(t, plan, Ok(route(1000.0))).unwrap();

        st.close_panel();
        assert_eq!(st.panel(), &Panel::Hidden);
    }
}
