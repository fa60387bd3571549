pub mod astar;
pub mod lee_moore;

pub use astar::AStarAlg;
pub use lee_moore::LeeMooreAlg;

use crate::observer::RoutingObserver;
use pinroute_common::db::core::ConnId;
use pinroute_common::geom::coord::Coord;
use pinroute_common::db::grid::Grid;
use std::collections::HashSet;

/// Knobs for a single `find_route` call.
pub struct RouteParams<'a> {
    /// Same-set routed cells cost 40 per step instead of 100, so
    /// extensions prefer riding an existing trunk.
    pub routed_cells_lower_cost: bool,
    /// Reset cell scratch before returning.
    pub clear_working_values: bool,
    /// Permit expansion through routed cells of other pin sets.
    pub attempt_rip: bool,
    /// Connections that may not be crossed even when ripping.
    pub rip_blacklist: &'a HashSet<ConnId>,
    /// Cost added to a step that crosses a foreign wire.
    pub rip_penalty: i32,
}

/// Outcome of a single-pair search. `route_coords` is ordered from the
/// source side toward the sink and excludes both endpoint pins; it is
/// empty iff no route was found. `requires_rip` is set when the route
/// crosses at least one cell owned by another connection.
#[derive(Clone, Debug, Default)]
pub struct RouteResult {
    pub route_coords: Vec<Coord>,
    pub requires_rip: bool,
}

impl RouteResult {
    pub fn is_empty(&self) -> bool {
        self.route_coords.is_empty()
    }
}

/// Contract shared by the single-pair search algorithms. `source` and
/// `sink` must be in-bounds cells of the same pin set. The grid is used
/// for scratch storage during the search; cell types are never changed
/// here. Failure is an empty result, never an error.
pub trait RoutingAlg {
    fn find_route(
        &self,
        source: Coord,
        sink: Coord,
        grid: &mut Grid,
        params: &RouteParams,
        observer: &mut RoutingObserver,
    ) -> RouteResult;
}

/// Instantiate an algorithm from its config name.
pub fn from_name(name: &str) -> Result<Box<dyn RoutingAlg>, String> {
    match name {
        "astar" | "a_star" | "a-star" => Ok(Box::new(AStarAlg)),
        "lee_moore" | "lee-moore" | "leemoore" => Ok(Box::new(LeeMooreAlg)),
        other => Err(format!(
            "unknown routing algorithm '{other}' (expected astar or lee_moore)"
        )),
    }
}

/// Expansion cost of stepping into a cell: 40 for same-set cells when the
/// reuse discount is on, 100 otherwise.
pub(crate) fn step_cost(routed_cells_lower_cost: bool, cell_pin_set_id: i32, pin_set_id: i32) -> i32 {
    if routed_cells_lower_cost && cell_pin_set_id == pin_set_id {
        40
    } else {
        100
    }
}

/// Whether stepping into this cell would cross a blacklisted connection.
pub(crate) fn crosses_blacklisted(grid: &Grid, coord: Coord, blacklist: &HashSet<ConnId>) -> bool {
    !blacklist.is_empty()
        && grid
            .connections_at(coord)
            .iter()
            .any(|id| blacklist.contains(id))
}
