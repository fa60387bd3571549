use crate::geom::coord::Coord;
use rand::Rng;
use rand::seq::SliceRandom;
use std::fs::File;
use std::io::Write;

/// Write a random problem file in the standard format. All obstruction
/// and pin coordinates are distinct, so the result always validates.
pub fn generate_random_problem(
    filename: &str,
    dim_x: i32,
    dim_y: i32,
    num_obstructions: usize,
    num_pin_sets: usize,
    max_pins_per_set: usize,
) -> std::io::Result<()> {
    let mut rng = rand::thread_rng();

    let mut coords: Vec<Coord> = (0..dim_y)
        .flat_map(|y| (0..dim_x).map(move |x| Coord::new(x, y)))
        .collect();
    coords.shuffle(&mut rng);

    let mut free = coords.into_iter();
    let obstructions: Vec<Coord> = free.by_ref().take(num_obstructions).collect();

    let mut pin_sets = Vec::with_capacity(num_pin_sets);
    for _ in 0..num_pin_sets {
        let k = rng.gen_range(2..=max_pins_per_set.max(2));
        let pins: Vec<Coord> = free.by_ref().take(k).collect();
        if pins.len() < 2 {
            break;
        }
        pin_sets.push(pins);
    }

    log::info!(
        "Generating benchmark: {}x{} grid, {} obstructions, {} pin sets",
        dim_x,
        dim_y,
        obstructions.len(),
        pin_sets.len()
    );

    let mut file = File::create(filename)?;
    writeln!(file, "{} {}", dim_x, dim_y)?;
    writeln!(file, "{}", obstructions.len())?;
    for obs in &obstructions {
        writeln!(file, "{} {}", obs.x, obs.y)?;
    }
    writeln!(file, "{}", pin_sets.len())?;
    for pins in &pin_sets {
        write!(file, "{}", pins.len())?;
        for pin in pins {
            write!(file, " {} {}", pin.x, pin.y)?;
        }
        writeln!(file)?;
    }
    Ok(())
}
