use crate::db::core::CellType;
use crate::db::grid::Grid;
use rayon::prelude::*;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Post-routing verification of a grid: bounds, cell/connection ownership
/// in both directions, scratch hygiene, and per-set connectivity.
pub fn run(grid: &Grid) -> Result<(), String> {
    log::info!("Starting routing verification...");

    let (ownership_result, connectivity_result) =
        rayon::join(|| check_ownership(grid), || check_connectivity(grid));

    let mut msgs = Vec::new();

    match ownership_result {
        Err(e) => {
            log::error!("\x1b[31mFAIL\x1b[0m: Grid ownership inconsistent");
            log::error!("{}", e);
            msgs.push(e);
        }
        Ok(_) => log::info!("\x1b[32mPASS\x1b[0m: Cell and connection ownership consistent."),
    }

    match connectivity_result {
        Err(e) => {
            log::error!("\x1b[31mFAIL\x1b[0m: Open pin set detected");
            log::error!("{}", e);
            msgs.push(e);
        }
        Ok(_) => log::info!("\x1b[32mPASS\x1b[0m: All pin sets fully connected."),
    }

    if msgs.is_empty() {
        log::info!("\x1b[32mSUCCESS\x1b[0m: VALID ROUTING");
        Ok(())
    } else {
        log::error!("\x1b[31mFAILURE\x1b[0m: INVALID ROUTING ({} errors)", msgs.len());
        Err(msgs.join("; "))
    }
}

fn record_error(error_found: &AtomicBool, error_msg: &Mutex<String>, msg: String) {
    if !error_found.swap(true, Ordering::Relaxed) {
        *error_msg.lock().unwrap() = msg;
    }
}

fn check_ownership(grid: &Grid) -> Result<(), String> {
    let error_found = AtomicBool::new(false);
    let error_msg = Mutex::new(String::new());

    grid.cells().par_iter().for_each(|cell| {
        if error_found.load(Ordering::Relaxed) {
            return;
        }
        if cell.working_value != -1 || cell.scratch.is_some() {
            record_error(
                &error_found,
                &error_msg,
                format!("cell {} carries leftover search scratch", cell.coord),
            );
            return;
        }
        match cell.kind {
            CellType::Routed => {
                if cell.pin_set_id < 0 {
                    record_error(
                        &error_found,
                        &error_msg,
                        format!("routed cell {} has no pin set", cell.coord),
                    );
                } else if grid.connections_at(cell.coord).is_empty() {
                    record_error(
                        &error_found,
                        &error_msg,
                        format!("routed cell {} is covered by no connection", cell.coord),
                    );
                }
            }
            CellType::Blank | CellType::Obstruction => {
                if cell.pin_set_id != -1 {
                    record_error(
                        &error_found,
                        &error_msg,
                        format!("non-wire cell {} claims a pin set", cell.coord),
                    );
                }
            }
            CellType::Pin => {
                if cell.pin_set_id < 0 {
                    record_error(
                        &error_found,
                        &error_msg,
                        format!("pin {} has no pin set", cell.coord),
                    );
                }
            }
        }
    });

    let conn_ids: Vec<_> = grid.connection_ids().collect();
    conn_ids.par_iter().for_each(|&id| {
        if error_found.load(Ordering::Relaxed) {
            return;
        }
        let connection = grid.connection(id);
        for &coord in &connection.routed_cells {
            if !grid.is_within_bounds(coord) {
                record_error(
                    &error_found,
                    &error_msg,
                    format!("{:?} covers out-of-bounds coordinate {}", id, coord),
                );
                return;
            }
            let cell = grid.cell_at(coord);
            if !matches!(cell.kind, CellType::Pin | CellType::Routed) {
                record_error(
                    &error_found,
                    &error_msg,
                    format!("{:?} covers {} which is {:?}", id, coord, cell.kind),
                );
                return;
            }
            if cell.pin_set_id != connection.pin_set_id {
                record_error(
                    &error_found,
                    &error_msg,
                    format!(
                        "{:?} of set {} covers {} owned by set {}",
                        id, connection.pin_set_id, coord, cell.pin_set_id
                    ),
                );
                return;
            }
            if !grid.connections_at(coord).contains(&id) {
                record_error(
                    &error_found,
                    &error_msg,
                    format!("{:?} missing from the index at {}", id, coord),
                );
                return;
            }
        }
    });

    if error_found.load(Ordering::Relaxed) {
        Err(error_msg.lock().unwrap().clone())
    } else {
        Ok(())
    }
}

fn check_connectivity(grid: &Grid) -> Result<(), String> {
    let error_found = AtomicBool::new(false);
    let error_msg = Mutex::new(String::new());

    let pin_sets: Vec<_> = grid.pin_sets().iter().collect();
    pin_sets.par_iter().for_each(|(id, pins)| {
        if error_found.load(Ordering::Relaxed) {
            return;
        }
        for pair in pins.windows(2) {
            if !grid.route_exists_between_pins(pair[0], pair[1], None) {
                record_error(
                    &error_found,
                    &error_msg,
                    format!(
                        "pin set {}: {} and {} are not connected",
                        id, pair[0], pair[1]
                    ),
                );
                return;
            }
        }
    });

    if error_found.load(Ordering::Relaxed) {
        Err(error_msg.lock().unwrap().clone())
    } else {
        Ok(())
    }
}
