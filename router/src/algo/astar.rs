use crate::algo::{RouteParams, RouteResult, RoutingAlg, crosses_blacklisted, step_cost};
use crate::observer::{RoutingObserver, Verbosity};
use pinroute_common::db::core::{AStarScratch, CellType};
use pinroute_common::db::grid::Grid;
use pinroute_common::geom::coord::Coord;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Primary frontier entry, ordered by f score, then remaining Manhattan
/// distance so that ties are broken toward the sink, then coordinate so
/// that equal entries pop deterministically.
#[derive(Copy, Clone, Eq, PartialEq)]
struct OpenState {
    f: i32,
    tie: i32,
    coord: Coord,
}

impl Ord for OpenState {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.tie.cmp(&self.tie))
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

impl PartialOrd for OpenState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Rip frontier entry: fewest crossed connections first, then cheapest,
/// then closest to the sink.
#[derive(Copy, Clone, Eq, PartialEq)]
struct RipState {
    ripped: i32,
    d: i32,
    tie: i32,
    coord: Coord,
}

impl Ord for RipState {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .ripped
            .cmp(&self.ripped)
            .then_with(|| other.d.cmp(&self.d))
            .then_with(|| other.tie.cmp(&self.tie))
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

impl PartialOrd for RipState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Best-first search with the admissible heuristic 100 x Manhattan
/// distance. Keeps two frontiers: rip candidates wait in a secondary heap
/// that is only drained once the primary is exhausted, so crossing a
/// foreign wire is considered strictly after every pure path.
pub struct AStarAlg;

impl RoutingAlg for AStarAlg {
    fn find_route(
        &self,
        source: Coord,
        sink: Coord,
        grid: &mut Grid,
        params: &RouteParams,
        observer: &mut RoutingObserver,
    ) -> RouteResult {
        let pin_set_id = grid.cell_at(source).pin_set_id;
        log::debug!("A* from {} to {} (set {})", source, sink, pin_set_id);

        let mut open = BinaryHeap::new();
        let mut rip_open = BinaryHeap::new();

        let h0 = 100 * source.manhattan_distance(sink);
        {
            let cell = grid.cell_at_mut(source);
            cell.working_value = h0;
            cell.scratch = Some(AStarScratch {
                from: None,
                d_from_source: 0,
                ripped_conns: 0,
            });
        }
        open.push(OpenState {
            f: h0,
            tie: source.manhattan_distance(sink),
            coord: source,
        });

        let mut termination: Option<(Coord, Vec<Coord>)> = None;
        'search: loop {
            let coord = if let Some(OpenState { f, coord, .. }) = open.pop() {
                if f != grid.cell_at(coord).working_value {
                    continue 'search;
                }
                coord
            } else if params.attempt_rip {
                match rip_open.pop() {
                    Some(RipState {
                        ripped, d, coord, ..
                    }) => {
                        let fresh = matches!(
                            grid.cell_at(coord).scratch,
                            Some(s) if s.ripped_conns == ripped && s.d_from_source == d
                        );
                        if !fresh {
                            continue 'search;
                        }
                        coord
                    }
                    None => break 'search,
                }
            } else {
                break 'search;
            };

            if coord == sink {
                termination = Some((coord, Vec::new()));
                break 'search;
            }
            let cell = grid.cell_at(coord);
            if cell.kind == CellType::Routed && cell.pin_set_id == pin_set_id {
                let mut tail = Vec::new();
                if grid.route_exists_between_pins(coord, sink, Some(&mut tail)) {
                    termination = Some((coord, tail));
                    break 'search;
                }
            }

            let marked = relax_neighbors(
                coord,
                sink,
                grid,
                pin_set_id,
                params,
                &mut open,
                &mut rip_open,
            );
            if marked {
                observer.log_cell_grid(
                    grid,
                    Verbosity::AllIntermediate,
                    Verbosity::AllIntermediate,
                );
            }
        }

        let mut result = RouteResult::default();
        if let Some((termination, tail)) = termination {
            result.requires_rip = grid
                .cell_at(termination)
                .scratch
                .map(|s| s.ripped_conns > 0)
                .unwrap_or(false);
            let mut route = backtrace(termination, source, grid);
            if termination != source && termination != sink {
                route.push(termination);
            }
            route.extend(tail);
            result.route_coords = route;
            observer.log_cell_grid(
                grid,
                Verbosity::CoarseIntermediate,
                Verbosity::CoarseIntermediate,
            );
        } else {
            log::debug!("A* found no route from {} to {}", source, sink);
        }

        if params.clear_working_values {
            grid.clear_working_values();
        }
        result
    }
}

/// Score the neighbors of an expanded cell. Pure candidates relax on a
/// smaller f; rip candidates relax on fewer crossed connections.
fn relax_neighbors(
    coord: Coord,
    sink: Coord,
    grid: &mut Grid,
    pin_set_id: i32,
    params: &RouteParams,
    open: &mut BinaryHeap<OpenState>,
    rip_open: &mut BinaryHeap<RipState>,
) -> bool {
    let parent = grid
        .cell_at(coord)
        .scratch
        .unwrap_or_else(|| panic!("expansion from unscored cell {}", coord));
    let mut marked = false;
    for neighbor in grid.neighbor_coords_of(coord) {
        let (kind, cell_set, working_value, scratch) = {
            let cell = grid.cell_at(neighbor);
            (cell.kind, cell.pin_set_id, cell.working_value, cell.scratch)
        };
        let h = 100 * neighbor.manhattan_distance(sink);
        let tie = neighbor.manhattan_distance(sink);

        if kind == CellType::Blank || cell_set == pin_set_id {
            let d = parent.d_from_source
                + step_cost(params.routed_cells_lower_cost, cell_set, pin_set_id);
            let f = d + h;
            if working_value < 0 || working_value > f {
                let cell = grid.cell_at_mut(neighbor);
                cell.working_value = f;
                cell.scratch = Some(AStarScratch {
                    from: Some(coord),
                    d_from_source: d,
                    ripped_conns: parent.ripped_conns,
                });
                open.push(OpenState {
                    f,
                    tie,
                    coord: neighbor,
                });
                marked = true;
            }
        } else if params.attempt_rip && kind == CellType::Routed && cell_set != pin_set_id {
            if crosses_blacklisted(grid, neighbor, params.rip_blacklist) {
                continue;
            }
            let crossed = grid.connections_at(neighbor).len() as i32;
            let d = parent.d_from_source + 100 + params.rip_penalty;
            let ripped = parent.ripped_conns + crossed;
            let update = match scratch {
                None => true,
                Some(s) => s.ripped_conns > ripped,
            };
            if update {
                let cell = grid.cell_at_mut(neighbor);
                cell.working_value = d + h;
                cell.scratch = Some(AStarScratch {
                    from: Some(coord),
                    d_from_source: d,
                    ripped_conns: ripped,
                });
                rip_open.push(RipState {
                    ripped,
                    d,
                    tie,
                    coord: neighbor,
                });
                marked = true;
            }
        }
    }
    marked
}

/// Follow the from-coordinate chain back to the source. Returns the cells
/// strictly between the termination and the source, ordered from the
/// source side toward the termination.
fn backtrace(termination: Coord, source: Coord, grid: &Grid) -> Vec<Coord> {
    let mut chain = Vec::new();
    let mut curr = termination;
    while curr != source {
        let from = match grid.cell_at(curr).scratch.and_then(|s| s.from) {
            Some(from) => from,
            None => panic!("broken backtrace chain at {}", curr),
        };
        if from != source {
            chain.push(from);
        }
        curr = from;
    }
    chain.reverse();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinroute_common::db::core::{Connection, PinPair};
    use std::collections::HashSet;

    fn params(blacklist: &HashSet<pinroute_common::db::core::ConnId>) -> RouteParams<'_> {
        RouteParams {
            routed_cells_lower_cost: true,
            clear_working_values: true,
            attempt_rip: false,
            rip_blacklist: blacklist,
            rip_penalty: 50_000,
        }
    }

    fn observer() -> RoutingObserver {
        RoutingObserver::new(Verbosity::ResultsOnly, Verbosity::ResultsOnly)
    }

    #[test]
    fn routes_a_straight_line() {
        let pins = vec![vec![Coord::new(0, 0), Coord::new(10, 0)]];
        let mut grid = Grid::new(11, 1, &[], &pins);
        let blacklist = HashSet::new();
        let result = AStarAlg.find_route(
            Coord::new(0, 0),
            Coord::new(10, 0),
            &mut grid,
            &params(&blacklist),
            &mut observer(),
        );
        let expected: Vec<Coord> = (1..10).map(|x| Coord::new(x, 0)).collect();
        assert_eq!(result.route_coords, expected);
        assert!(!result.requires_rip);
        assert!(grid.cells().iter().all(|c| c.scratch.is_none()));
    }

    #[test]
    fn fails_without_rip_and_crosses_with_rip() {
        let pins = vec![
            vec![Coord::new(0, 1), Coord::new(4, 1)],
            vec![Coord::new(2, 0), Coord::new(2, 2)],
        ];
        let mut grid = Grid::new(5, 3, &[], &pins);
        grid.add_connection(Connection::new(
            PinPair::new(Coord::new(2, 0), Coord::new(2, 2)),
            vec![Coord::new(2, 0), Coord::new(2, 1), Coord::new(2, 2)],
            1,
        ));
        let blacklist = HashSet::new();
        let mut p = params(&blacklist);
        let result = AStarAlg.find_route(
            Coord::new(0, 1),
            Coord::new(4, 1),
            &mut grid,
            &p,
            &mut observer(),
        );
        assert!(result.is_empty());

        p.attempt_rip = true;
        let result = AStarAlg.find_route(
            Coord::new(0, 1),
            Coord::new(4, 1),
            &mut grid,
            &p,
            &mut observer(),
        );
        assert_eq!(
            result.route_coords,
            vec![Coord::new(1, 1), Coord::new(2, 1), Coord::new(3, 1)]
        );
        assert!(result.requires_rip);
    }

    #[test]
    fn prefers_a_detour_over_ripping() {
        // The foreign wire leaves row 3 open; the detour must win even
        // though crossing at (2,1) would be far shorter in steps.
        let pins = vec![
            vec![Coord::new(0, 1), Coord::new(4, 1)],
            vec![Coord::new(2, 0), Coord::new(2, 2)],
        ];
        let mut grid = Grid::new(5, 4, &[], &pins);
        grid.add_connection(Connection::new(
            PinPair::new(Coord::new(2, 0), Coord::new(2, 2)),
            vec![Coord::new(2, 0), Coord::new(2, 1), Coord::new(2, 2)],
            1,
        ));
        let blacklist = HashSet::new();
        let mut p = params(&blacklist);
        p.attempt_rip = true;
        let result = AStarAlg.find_route(
            Coord::new(0, 1),
            Coord::new(4, 1),
            &mut grid,
            &p,
            &mut observer(),
        );
        assert!(!result.is_empty());
        assert!(!result.requires_rip);
        assert!(!result.route_coords.contains(&Coord::new(2, 1)));
    }

    #[test]
    fn trunk_reuse_creates_fewer_new_routed_cells() {
        let run = |lower_cost: bool| -> usize {
            let pins = vec![vec![Coord::new(0, 0), Coord::new(4, 0), Coord::new(4, 4)]];
            let mut grid = Grid::new(5, 5, &[], &pins);
            let blacklist = HashSet::new();
            let mut p = params(&blacklist);
            p.routed_cells_lower_cost = lower_cost;

            let first = AStarAlg.find_route(
                Coord::new(0, 0),
                Coord::new(4, 0),
                &mut grid,
                &p,
                &mut observer(),
            );
            let mut cells = vec![Coord::new(0, 0)];
            cells.extend(first.route_coords.iter().copied());
            cells.push(Coord::new(4, 0));
            grid.add_connection(Connection::new(
                PinPair::new(Coord::new(0, 0), Coord::new(4, 0)),
                cells,
                0,
            ));
            let before = grid.count_cells(&[CellType::Routed]);

            let second = AStarAlg.find_route(
                Coord::new(0, 0),
                Coord::new(4, 4),
                &mut grid,
                &p,
                &mut observer(),
            );
            assert!(!second.is_empty());
            let mut cells = vec![Coord::new(0, 0)];
            cells.extend(
                second
                    .route_coords
                    .iter()
                    .copied()
                    .filter(|&c| c != Coord::new(0, 0) && c != Coord::new(4, 4)),
            );
            cells.push(Coord::new(4, 4));
            grid.add_connection(Connection::new(
                PinPair::new(Coord::new(0, 0), Coord::new(4, 4)),
                cells,
                0,
            ));
            grid.count_cells(&[CellType::Routed]) - before
        };

        let with_reuse = run(true);
        let without_reuse = run(false);
        assert!(with_reuse < without_reuse);
    }
}
