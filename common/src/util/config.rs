use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub observer: ObserverConfig,
    #[serde(default)]
    pub input: InputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            observer: ObserverConfig::default(),
            input: InputConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RouterConfig {
    /// Which single-pair search to use: "astar" or "lee_moore".
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_routed_cells_lower_cost")]
    pub routed_cells_lower_cost: bool,
    #[serde(default = "default_rip_and_reroute")]
    pub rip_and_reroute: bool,
    /// Rip attempts per blocked pair before giving up on it.
    #[serde(default = "default_rip_and_reroute_count")]
    pub rip_and_reroute_count: u32,
    /// Full-suite sweeps before declaring the problem unroutable.
    #[serde(default = "default_max_rerun_count")]
    pub max_rerun_count: u32,
    /// Failure count at which a difficult pair is boosted to the front.
    #[serde(default = "default_difficult_boost_thresh")]
    pub difficult_boost_thresh: u32,
    /// Cost added to a search step that crosses a foreign wire.
    #[serde(default = "default_rip_penalty")]
    pub rip_penalty: i32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            routed_cells_lower_cost: default_routed_cells_lower_cost(),
            rip_and_reroute: default_rip_and_reroute(),
            rip_and_reroute_count: default_rip_and_reroute_count(),
            max_rerun_count: default_max_rerun_count(),
            difficult_boost_thresh: default_difficult_boost_thresh(),
            rip_penalty: default_rip_penalty(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObserverConfig {
    /// Snapshot storage threshold: "all", "coarse" or "results".
    #[serde(default = "default_log_verbosity")]
    pub log_verbosity: String,
    /// Live-update threshold: "all", "coarse" or "results".
    #[serde(default = "default_ui_verbosity")]
    pub ui_verbosity: String,
    /// Capacity of the live snapshot channel; overflow is dropped.
    #[serde(default = "default_live_capacity")]
    pub live_capacity: usize,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            log_verbosity: default_log_verbosity(),
            ui_verbosity: default_ui_verbosity(),
            live_capacity: default_live_capacity(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_problem_file")]
    pub problem_file: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            problem_file: default_problem_file(),
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_algorithm() -> String {
    "astar".to_string()
}

fn default_routed_cells_lower_cost() -> bool {
    true
}

fn default_rip_and_reroute() -> bool {
    true
}

fn default_rip_and_reroute_count() -> u32 {
    2
}

fn default_max_rerun_count() -> u32 {
    4
}

fn default_difficult_boost_thresh() -> u32 {
    2
}

fn default_rip_penalty() -> i32 {
    50_000
}

fn default_log_verbosity() -> String {
    "coarse".to_string()
}

fn default_ui_verbosity() -> String {
    "results".to_string()
}

fn default_live_capacity() -> usize {
    8
}

fn default_problem_file() -> String {
    "inputs/example.infile".to_string()
}

fn default_cache_dir() -> String {
    "cache".to_string()
}
