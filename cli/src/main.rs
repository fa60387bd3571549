use clap::{Parser, Subcommand};
use pinroute_common::db::core::CellType;
use pinroute_common::db::grid::Grid;
use pinroute_common::db::problem::Problem;
use pinroute_common::util::config::Config;
use pinroute_common::util::{check, generator, logger};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a problem file.
    Route {
        /// Problem file; falls back to the configured input.
        in_file: Option<PathBuf>,
        /// Directory for the routed-grid dump and run summary.
        #[arg(long, value_name = "DIR")]
        cache: Option<PathBuf>,
    },
    /// Generate a random problem file.
    Generate {
        #[arg(long, default_value_t = 40)]
        dim_x: i32,
        #[arg(long, default_value_t = 40)]
        dim_y: i32,
        #[arg(long, default_value_t = 60)]
        obstructions: usize,
        #[arg(long, default_value_t = 6)]
        pin_sets: usize,
        #[arg(long, default_value_t = 4)]
        max_pins_per_set: usize,
        #[arg(long, default_value = "inputs/random.infile")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let config = if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        let config_str = std::fs::read_to_string(&args.config)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
        Config::default()
    };

    let command = args.command.unwrap_or(Commands::Route {
        in_file: None,
        cache: None,
    });

    match command {
        Commands::Generate {
            dim_x,
            dim_y,
            obstructions,
            pin_sets,
            max_pins_per_set,
            out,
        } => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            log::info!("Generating random problem...");
            generator::generate_random_problem(
                out.to_str()
                    .ok_or_else(|| anyhow::anyhow!("Output path is not valid UTF-8"))?,
                dim_x,
                dim_y,
                obstructions,
                pin_sets,
                max_pins_per_set,
            )?;
        }
        Commands::Route { in_file, cache } => {
            let in_path = in_file.unwrap_or_else(|| PathBuf::from(&config.input.problem_file));
            if !in_path.exists() {
                return Err(anyhow::anyhow!(
                    "Problem file missing: {:?}. Generate one with 'pinroute generate'.",
                    in_path
                ));
            }
            run_routing(&in_path, cache.as_deref(), &config)?;
        }
    }

    Ok(())
}

fn run_routing(in_path: &Path, cache: Option<&Path>, config: &Config) -> anyhow::Result<()> {
    log::info!("Parsing problem: {}", in_path.display());
    let problem = Problem::from_path(in_path)
        .map_err(|e| anyhow::anyhow!("Invalid problem file '{}': {}", in_path.display(), e))?;
    log::info!(
        "Problem: {}x{} grid, {} obstructions, {} pin sets",
        problem.dim_x(),
        problem.dim_y(),
        problem.obstructions().len(),
        problem.pin_sets().len()
    );

    log::info!("Starting routing...");
    let report = pinroute_router::route(&problem, config).map_err(|e| anyhow::anyhow!(e))?;

    if report.success {
        check::run(&report.grid).map_err(|e| anyhow::anyhow!("Verification failed: {}", e))?;
    } else {
        log::error!("Routing incomplete: some pin pairs are unreachable.");
    }

    log::info!(
        "Result: {} connections, {} routed cells, {} snapshots recorded",
        report.grid.count_segments(),
        report.grid.count_cells(&[CellType::Routed]),
        report
            .collection
            .solve_steps
            .iter()
            .map(|s| s.step_grids.len())
            .sum::<usize>()
    );

    let cache_dir = cache
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.input.cache_dir));
    if !cache_dir.as_os_str().is_empty() {
        std::fs::create_dir_all(&cache_dir)?;
        let out_path = cache_dir.join("routed.txt");
        log::info!("Writing routed grid to {:?}", out_path);
        std::fs::write(&out_path, render_grid(&report.grid))?;
    }

    Ok(())
}

/// Plain-text rendering of a grid: '.' blank, '#' obstruction, pins as
/// capitals and wires as lower-case letters keyed by pin set.
fn render_grid(grid: &Grid) -> String {
    let mut out = String::with_capacity(((grid.dim_x() + 1) * grid.dim_y()) as usize);
    for y in 0..grid.dim_y() {
        for x in 0..grid.dim_x() {
            let cell = grid.cell_at(pinroute_common::geom::coord::Coord::new(x, y));
            let glyph = match cell.kind {
                CellType::Blank => '.',
                CellType::Obstruction => '#',
                CellType::Pin => (b'A' + (cell.pin_set_id % 26) as u8) as char,
                CellType::Routed => (b'a' + (cell.pin_set_id % 26) as u8) as char,
            };
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}
