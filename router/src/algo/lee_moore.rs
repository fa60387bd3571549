use crate::algo::{RouteParams, RouteResult, RoutingAlg, crosses_blacklisted, step_cost};
use crate::observer::{RoutingObserver, Verbosity};
use pinroute_common::db::core::CellType;
use pinroute_common::db::grid::Grid;
use pinroute_common::geom::coord::Coord;
use std::collections::VecDeque;

/// Lee-Moore wavefront router. Phase 1 floods outward from the source
/// over blank and same-set cells, accumulating step costs in the working
/// values. If the frontier drains without reaching the sink and ripping
/// is permitted, phase 2 re-floods with foreign routed cells admitted.
/// The route is recovered by walking strictly-descending working values
/// back to the source.
pub struct LeeMooreAlg;

impl RoutingAlg for LeeMooreAlg {
    fn find_route(
        &self,
        source: Coord,
        sink: Coord,
        grid: &mut Grid,
        params: &RouteParams,
        observer: &mut RoutingObserver,
    ) -> RouteResult {
        let pin_set_id = grid.cell_at(source).pin_set_id;
        log::debug!("Lee-Moore from {} to {} (set {})", source, sink, pin_set_id);

        let mut rip_phase = false;
        let mut queue = VecDeque::new();
        grid.cell_at_mut(source).working_value = 0;
        queue.push_back(source);

        let mut termination: Option<(Coord, Vec<Coord>)> = None;
        while let Some(coord) = queue.pop_front() {
            if grid.cell_at(coord).pin_set_id == pin_set_id {
                let mut tail = Vec::new();
                if grid.route_exists_between_pins(coord, sink, Some(&mut tail)) {
                    termination = Some((coord, tail));
                    break;
                }
            }
            let marked = mark_neighbors(coord, grid, pin_set_id, rip_phase, params, &mut queue);
            if marked {
                observer.log_cell_grid(
                    grid,
                    Verbosity::AllIntermediate,
                    Verbosity::AllIntermediate,
                );
            }
            if queue.is_empty() && !rip_phase && params.attempt_rip {
                rip_phase = true;
                grid.clear_working_values();
                grid.cell_at_mut(source).working_value = 0;
                queue.push_back(source);
            }
        }

        let mut result = RouteResult::default();
        if let Some((termination, tail)) = termination {
            let mut route = backtrace(termination, source, grid);
            route.reverse();
            if termination != source && termination != sink {
                route.push(termination);
            }
            route.extend(tail);
            result.route_coords = route;
            result.requires_rip = rip_phase;
            observer.log_cell_grid(
                grid,
                Verbosity::CoarseIntermediate,
                Verbosity::CoarseIntermediate,
            );
        } else {
            log::debug!("Lee-Moore found no route from {} to {}", source, sink);
        }

        if params.clear_working_values {
            grid.clear_working_values();
        }
        result
    }
}

/// Assign working values to unvisited eligible neighbors and enqueue
/// them. Returns whether any neighbor was marked.
fn mark_neighbors(
    coord: Coord,
    grid: &mut Grid,
    pin_set_id: i32,
    allow_rip: bool,
    params: &RouteParams,
    queue: &mut VecDeque<Coord>,
) -> bool {
    let mut marked = false;
    let parent_value = grid.cell_at(coord).working_value;
    for neighbor in grid.neighbor_coords_of(coord) {
        let (kind, cell_set, visited) = {
            let cell = grid.cell_at(neighbor);
            (cell.kind, cell.pin_set_id, cell.working_value >= 0)
        };
        if visited {
            continue;
        }
        let eligible = kind == CellType::Blank || cell_set == pin_set_id;
        let eligible_rip = allow_rip
            && kind == CellType::Routed
            && cell_set != pin_set_id
            && !crosses_blacklisted(grid, neighbor, params.rip_blacklist);
        if eligible || eligible_rip {
            let cost = step_cost(params.routed_cells_lower_cost, cell_set, pin_set_id);
            grid.cell_at_mut(neighbor).working_value = parent_value + cost;
            queue.push_back(neighbor);
            marked = true;
        }
    }
    marked
}

/// Walk from the termination toward the source, always stepping to the
/// first neighbor (in enumeration order) with a strictly lower working
/// value. Returns the visited cells in termination-to-source order,
/// excluding both ends.
fn backtrace(termination: Coord, source: Coord, grid: &Grid) -> Vec<Coord> {
    let mut route = Vec::new();
    let mut curr = termination;
    'walk: while curr != source {
        let curr_value = grid.cell_at(curr).working_value;
        for neighbor in grid.neighbor_coords_of(curr) {
            let value = grid.cell_at(neighbor).working_value;
            if value == 0 {
                break 'walk;
            }
            if value > 0 && value < curr_value {
                route.push(neighbor);
                curr = neighbor;
                continue 'walk;
            }
        }
        panic!("backtrace stuck at {} (working value {})", curr, curr_value);
    }
    route
}
