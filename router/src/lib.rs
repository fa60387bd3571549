pub mod algo;
pub mod observer;
pub mod suite;

use observer::{RoutingObserver, SolveCollection};
use pinroute_common::db::grid::Grid;
use pinroute_common::db::problem::Problem;
use pinroute_common::util::config::Config;
use std::sync::atomic::AtomicBool;

/// Everything a caller needs after a suite run: the final grid, whether
/// all pin sets were connected, and the recorded solve steps.
pub struct RouteReport {
    pub success: bool,
    pub grid: Grid,
    pub collection: SolveCollection,
}

/// Route a whole problem with the configured algorithm and observer
/// settings. An unroutable problem is a `success == false` report, not an
/// error; errors are reserved for invalid input or configuration.
pub fn route(problem: &Problem, config: &Config) -> Result<RouteReport, String> {
    problem.validate().map_err(|e| e.to_string())?;

    let mut grid = problem.seed_grid();
    let mut observer = RoutingObserver::from_config(&config.observer)?;
    let mut router = suite::Router::from_config(&config.router)?;
    let soft_halt = AtomicBool::new(false);

    let success = router.route_suite(problem.pin_sets(), &mut grid, &soft_halt, &mut observer);

    Ok(RouteReport {
        success,
        grid,
        collection: observer.into_collection(),
    })
}
