use pinroute_common::db::grid::Grid;
use std::str::FromStr;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

/// Snapshot detail level. Ordered from chattiest to quietest; an event is
/// accepted when its level is at or above the configured threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    AllIntermediate,
    CoarseIntermediate,
    ResultsOnly,
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Verbosity::AllIntermediate),
            "coarse" => Ok(Verbosity::CoarseIntermediate),
            "results" => Ok(Verbosity::ResultsOnly),
            other => Err(format!(
                "unknown verbosity '{other}' (expected all, coarse or results)"
            )),
        }
    }
}

/// The recorded snapshots of one solve attempt.
#[derive(Clone, Debug, Default)]
pub struct SolveSteps {
    pub desc: String,
    pub step_grids: Vec<Grid>,
}

/// All solve attempts of a suite run.
#[derive(Clone, Debug, Default)]
pub struct SolveCollection {
    pub solve_steps: Vec<SolveSteps>,
}

impl SolveCollection {
    pub fn clear(&mut self) {
        self.solve_steps.clear();
    }
}

/// Sink for intermediate grid states. Snapshots are deep clones, so the
/// router may keep mutating immediately. Stored snapshots are gated by
/// `log_verbosity`; live updates by `ui_verbosity` and delivered over a
/// bounded channel with `try_send`, so a slow or absent consumer never
/// stalls the routing thread.
pub struct RoutingObserver {
    log_verbosity: Verbosity,
    ui_verbosity: Verbosity,
    collection: SolveCollection,
    live: Option<SyncSender<Grid>>,
}

impl RoutingObserver {
    pub fn new(log_verbosity: Verbosity, ui_verbosity: Verbosity) -> Self {
        Self {
            log_verbosity,
            ui_verbosity,
            collection: SolveCollection::default(),
            live: None,
        }
    }

    pub fn from_config(
        config: &pinroute_common::util::config::ObserverConfig,
    ) -> Result<Self, String> {
        Ok(Self::new(
            config.log_verbosity.parse()?,
            config.ui_verbosity.parse()?,
        ))
    }

    pub fn log_verbosity(&self) -> Verbosity {
        self.log_verbosity
    }

    pub fn ui_verbosity(&self) -> Verbosity {
        self.ui_verbosity
    }

    /// Create the live update channel and return its receiving end.
    pub fn live_channel(&mut self, capacity: usize) -> Receiver<Grid> {
        let (tx, rx) = sync_channel(capacity.max(1));
        self.live = Some(tx);
        rx
    }

    /// Start a new solve-steps entry; subsequent snapshots append to it.
    pub fn open_solve_steps(&mut self, desc: &str) {
        self.collection.solve_steps.push(SolveSteps {
            desc: desc.to_string(),
            step_grids: Vec::new(),
        });
    }

    /// Record a grid state. The snapshot is stored iff `detail` is at or
    /// above the log threshold and a solve-steps entry is open; a live
    /// update is attempted iff `ui` is at or above the UI threshold.
    pub fn log_cell_grid(&mut self, grid: &Grid, detail: Verbosity, ui: Verbosity) {
        if ui >= self.ui_verbosity {
            if let Some(tx) = &self.live {
                match tx.try_send(grid.clone()) {
                    Ok(()) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Disconnected(_)) => self.live = None,
                }
            }
        }
        if detail < self.log_verbosity {
            return;
        }
        if let Some(steps) = self.collection.solve_steps.last_mut() {
            steps.step_grids.push(grid.clone());
        }
    }

    pub fn collection(&self) -> &SolveCollection {
        &self.collection
    }

    pub fn into_collection(self) -> SolveCollection {
        self.collection
    }
}
