use crate::algo::{self, RouteParams, RouteResult, RoutingAlg};
use crate::observer::{RoutingObserver, Verbosity};
use pinroute_common::db::core::{ConnId, Connection, PinPair, PinSet};
use pinroute_common::db::grid::Grid;
use pinroute_common::geom::coord::Coord;
use pinroute_common::util::config::RouterConfig;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

#[derive(Clone, Debug)]
pub struct RouterSettings {
    pub routed_cells_lower_cost: bool,
    pub rip_and_reroute: bool,
    pub rip_and_reroute_count: u32,
    pub max_rerun_count: u32,
    pub difficult_boost_thresh: u32,
    pub rip_penalty: i32,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from(&RouterConfig::default())
    }
}

impl From<&RouterConfig> for RouterSettings {
    fn from(config: &RouterConfig) -> Self {
        Self {
            routed_cells_lower_cost: config.routed_cells_lower_cost,
            rip_and_reroute: config.rip_and_reroute,
            rip_and_reroute_count: config.rip_and_reroute_count,
            max_rerun_count: config.max_rerun_count,
            difficult_boost_thresh: config.difficult_boost_thresh,
            rip_penalty: config.rip_penalty,
        }
    }
}

/// Suite-level scheduler. Routes nearest pin pairs first, boosts pairs
/// that keep failing to the front of the queue, and restarts the whole
/// sweep from a pristine grid when a sweep leaves failures behind.
pub struct Router {
    settings: RouterSettings,
    alg: Box<dyn RoutingAlg>,
}

impl Router {
    pub fn new(alg: Box<dyn RoutingAlg>, settings: RouterSettings) -> Self {
        Self { settings, alg }
    }

    pub fn from_config(config: &RouterConfig) -> Result<Self, String> {
        Ok(Self::new(
            algo::from_name(&config.algorithm)?,
            RouterSettings::from(config),
        ))
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Attempt to route every pin pair of every set. Returns whether the
    /// whole suite succeeded; partial progress stays committed on the
    /// grid when the soft halt is raised.
    pub fn route_suite(
        &mut self,
        pin_sets: &[PinSet],
        grid: &mut Grid,
        soft_halt: &AtomicBool,
        observer: &mut RoutingObserver,
    ) -> bool {
        let start = Instant::now();

        let all_pins: HashSet<Coord> = pin_sets.iter().flatten().copied().collect();
        let mut unrouted_pins = all_pins.clone();

        // nearest pairs first: multimap keyed by Manhattan distance
        let mut map_pin_pairs: BTreeMap<i32, VecDeque<PinPair>> = BTreeMap::new();
        for pins in pin_sets {
            for i in 0..pins.len() {
                for j in (i + 1)..pins.len() {
                    map_pin_pairs
                        .entry(pins[i].manhattan_distance(pins[j]))
                        .or_default()
                        .push_back(PinPair::new(pins[i], pins[j]));
                }
            }
        }

        let grid_backup = grid.clone();
        let map_pin_pairs_backup = map_pin_pairs.clone();

        let mut priority_routes: VecDeque<PinPair> = VecDeque::new();
        let mut difficult_pairs: VecDeque<PinPair> = VecDeque::new();
        let mut difficult_pair_failure_count: HashMap<PinPair, u32> = HashMap::new();
        let mut failed_pins: HashSet<Coord> = HashSet::new();

        let mut attempts_left = self.settings.max_rerun_count;
        // nothing to connect is a trivially complete suite
        let mut all_done = map_pin_pairs.is_empty();
        let mut sweep = 1;
        observer.open_solve_steps("sweep 1");

        while !soft_halt.load(Ordering::Relaxed)
            && !all_done
            && attempts_left > 0
            && !map_pin_pairs.is_empty()
        {
            let pair = if let Some(pair) = priority_routes.pop_front() {
                pair
            } else {
                let (&dist, _) = map_pin_pairs.iter().next().unwrap();
                let bucket = map_pin_pairs.get_mut(&dist).unwrap();
                let pair = bucket.pop_front().unwrap();
                if bucket.is_empty() {
                    map_pin_pairs.remove(&dist);
                }
                pair
            };

            // canonical orientation: route from an unrouted pin; a pair
            // whose pins are both already wired in is skipped
            let oriented = if unrouted_pins.contains(&pair.a) {
                Some((pair.a, pair.b))
            } else if unrouted_pins.contains(&pair.b) {
                Some((pair.b, pair.a))
            } else {
                None
            };

            if let Some((source, sink)) = oriented {
                if self.route_pin_pair(source, sink, grid, observer) {
                    unrouted_pins.remove(&pair.a);
                    unrouted_pins.remove(&pair.b);
                } else {
                    log::debug!("failed to route {} to {}", source, sink);
                    failed_pins.insert(pair.a);
                    failed_pins.insert(pair.b);
                    match difficult_pair_failure_count.get_mut(&pair) {
                        Some(count) => {
                            *count += 1;
                            if *count >= self.settings.difficult_boost_thresh {
                                if let Some(pos) =
                                    difficult_pairs.iter().position(|p| *p == pair)
                                {
                                    difficult_pairs.remove(pos);
                                }
                                difficult_pairs.push_front(pair);
                                *count = 0;
                            }
                        }
                        None => {
                            difficult_pair_failure_count.insert(pair, 1);
                            difficult_pairs.push_front(pair);
                        }
                    }
                }
            }

            if map_pin_pairs.is_empty() && priority_routes.is_empty() {
                if failed_pins.is_empty() {
                    all_done = true;
                } else {
                    attempts_left -= 1;
                    log::info!(
                        "sweep {} left {} difficult pairs; {} retries remain",
                        sweep,
                        difficult_pairs.len(),
                        attempts_left
                    );
                    for &pair in &difficult_pairs {
                        priority_routes.push_back(pair);
                    }
                    *grid = grid_backup.clone();
                    map_pin_pairs = map_pin_pairs_backup.clone();
                    unrouted_pins = all_pins.clone();
                    failed_pins.clear();
                    sweep += 1;
                    if attempts_left > 0 {
                        observer.open_solve_steps(&format!("sweep {}", sweep));
                    }
                }
            }
        }

        if soft_halt.load(Ordering::Relaxed) {
            log::info!("soft halt raised; leaving committed routes in place");
        }

        if all_done {
            let verified = grid.all_pins_routed();
            if !verified {
                log::warn!("suite bookkeeping claims success but the grid disagrees");
                all_done = false;
            }
        }
        grid.clear_working_values();

        log::info!(
            "routing suite {} after {} sweep(s) in {:.2?}: {} connections, {} routed cells",
            if all_done { "succeeded" } else { "failed" },
            sweep,
            start.elapsed(),
            grid.count_segments(),
            grid.count_cells(&[pinroute_common::db::core::CellType::Routed]),
        );
        all_done
    }

    /// Route one oriented pair. Tries, in order: the pre-existing wiring,
    /// a plain search, and rip-and-reroute when the search only found a
    /// route across foreign wires.
    fn route_pin_pair(
        &mut self,
        source: Coord,
        sink: Coord,
        grid: &mut Grid,
        observer: &mut RoutingObserver,
    ) -> bool {
        let pin_set_id = grid.cell_at(source).pin_set_id;
        let pair = PinPair::new(source, sink);

        let mut existing_route = Vec::new();
        if grid.route_exists_between_pins(source, sink, Some(&mut existing_route)) {
            log::debug!("{} and {} already connected", source, sink);
            create_connection(pair, &existing_route, pin_set_id, grid);
            return true;
        }

        let empty_blacklist = HashSet::new();
        let params = RouteParams {
            routed_cells_lower_cost: self.settings.routed_cells_lower_cost,
            clear_working_values: true,
            attempt_rip: self.settings.rip_and_reroute,
            rip_blacklist: &empty_blacklist,
            rip_penalty: self.settings.rip_penalty,
        };
        let result = self.alg.find_route(source, sink, grid, &params, observer);

        if !result.is_empty() && !result.requires_rip {
            create_connection(pair, &result.route_coords, pin_set_id, grid);
            grid.clear_working_values();
            observer.log_cell_grid(grid, Verbosity::ResultsOnly, Verbosity::ResultsOnly);
            return true;
        }

        if !result.is_empty() && result.requires_rip && self.settings.rip_and_reroute {
            return self.rip_and_reroute(pair, result, pin_set_id, grid, observer);
        }

        grid.clear_working_values();
        observer.log_cell_grid(grid, Verbosity::ResultsOnly, Verbosity::ResultsOnly);
        false
    }

    /// Accept a route that crosses foreign connections by ripping them,
    /// then reroute every ripped pair without rip rights. Any failure
    /// rolls the grid back to the pre-rip snapshot, blacklists the
    /// crossed connections and retries the original pair.
    fn rip_and_reroute(
        &mut self,
        pair: PinPair,
        mut result: RouteResult,
        pin_set_id: i32,
        grid: &mut Grid,
        observer: &mut RoutingObserver,
    ) -> bool {
        grid.clear_working_values();
        let grid_pre_rip = grid.clone();
        let mut blacklist: HashSet<ConnId> = HashSet::new();

        for attempt in 1..=self.settings.rip_and_reroute_count {
            let conns_to_rip = existing_connections(&result.route_coords, grid, pin_set_id);
            log::debug!(
                "rip attempt {} for {} to {}: ripping {} connections",
                attempt,
                pair.a,
                pair.b,
                conns_to_rip.len()
            );

            let mut pairs_to_reroute: Vec<(PinPair, i32)> = Vec::new();
            for id in conns_to_rip {
                let ripped = grid.rip_connection(id);
                pairs_to_reroute.push((ripped.pin_pair, ripped.pin_set_id));
            }
            create_connection(pair, &result.route_coords, pin_set_id, grid);

            let mut rerouted_all = true;
            for &(reroute_pair, reroute_set) in &pairs_to_reroute {
                let params = RouteParams {
                    routed_cells_lower_cost: self.settings.routed_cells_lower_cost,
                    clear_working_values: true,
                    attempt_rip: false,
                    rip_blacklist: &blacklist,
                    rip_penalty: self.settings.rip_penalty,
                };
                let rerouted =
                    self.alg
                        .find_route(reroute_pair.a, reroute_pair.b, grid, &params, observer);
                if rerouted.is_empty() {
                    log::debug!(
                        "reroute of {} to {} failed after rip",
                        reroute_pair.a,
                        reroute_pair.b
                    );
                    rerouted_all = false;
                    break;
                }
                create_connection(reroute_pair, &rerouted.route_coords, reroute_set, grid);
            }

            if rerouted_all {
                grid.clear_working_values();
                observer.log_cell_grid(grid, Verbosity::ResultsOnly, Verbosity::ResultsOnly);
                return true;
            }

            *grid = grid_pre_rip.clone();
            blacklist.extend(existing_connections(&result.route_coords, grid, pin_set_id));

            let params = RouteParams {
                routed_cells_lower_cost: self.settings.routed_cells_lower_cost,
                clear_working_values: true,
                attempt_rip: true,
                rip_blacklist: &blacklist,
                rip_penalty: self.settings.rip_penalty,
            };
            result = self.alg.find_route(pair.a, pair.b, grid, &params, observer);
            if result.is_empty() {
                break;
            }
            if !result.requires_rip {
                create_connection(pair, &result.route_coords, pin_set_id, grid);
                grid.clear_working_values();
                observer.log_cell_grid(grid, Verbosity::ResultsOnly, Verbosity::ResultsOnly);
                return true;
            }
        }

        grid.clear_working_values();
        observer.log_cell_grid(grid, Verbosity::ResultsOnly, Verbosity::ResultsOnly);
        false
    }
}

/// Register a connection along a route. The stored cells always include
/// both endpoint pins exactly once.
fn create_connection(pair: PinPair, route: &[Coord], pin_set_id: i32, grid: &mut Grid) -> ConnId {
    let mut cells = Vec::with_capacity(route.len() + 2);
    cells.push(pair.a);
    cells.extend(route.iter().copied().filter(|&c| c != pair.a && c != pair.b));
    cells.push(pair.b);
    grid.add_connection(Connection::new(pair, cells, pin_set_id))
}

/// Connections of other pin sets passing through any of the given
/// coordinates, deduplicated, in first-crossing order.
fn existing_connections(coords: &[Coord], grid: &Grid, ignore_pin_set: i32) -> Vec<ConnId> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for &coord in coords {
        for &id in grid.connections_at(coord) {
            if grid.connection(id).pin_set_id != ignore_pin_set && seen.insert(id) {
                found.push(id);
            }
        }
    }
    found
}
