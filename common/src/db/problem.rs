use crate::db::core::PinSet;
use crate::db::grid::Grid;
use crate::geom::coord::Coord;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a problem file was rejected.
#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("cannot read problem file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("line {line}: {declared} {what} declared but {found} parsed")]
    CountMismatch {
        line: usize,
        what: &'static str,
        declared: usize,
        found: usize,
    },

    #[error("invalid grid dimensions {dim_x}x{dim_y}")]
    BadDimensions { dim_x: i32, dim_y: i32 },

    #[error("problem has no pin sets")]
    NoPinSets,

    #[error("{what} at {coord} is outside the {dim_x}x{dim_y} grid")]
    OutOfBounds {
        what: &'static str,
        coord: Coord,
        dim_x: i32,
        dim_y: i32,
    },

    #[error("pin and obstruction clash at {coord}")]
    PinObstructionClash { coord: Coord },
}

/// A parsed routing problem. Immutable once constructed; the router works
/// on grids seeded from it.
#[derive(Clone, Debug)]
pub struct Problem {
    dim_x: i32,
    dim_y: i32,
    obstructions: Vec<Coord>,
    pin_sets: Vec<PinSet>,
}

impl Problem {
    pub fn new(dim_x: i32, dim_y: i32, obstructions: Vec<Coord>, pin_sets: Vec<PinSet>) -> Self {
        Self {
            dim_x,
            dim_y,
            obstructions,
            pin_sets,
        }
    }

    /// Read and validate a problem file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ProblemError> {
        let path = path.as_ref();
        log::debug!("reading problem file {}", path.display());
        let file = std::fs::File::open(path).map_err(|source| ProblemError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let problem = Self::parse(std::io::BufReader::new(file))?;
        problem.validate()?;
        Ok(problem)
    }

    /// Parse the line-oriented problem format:
    /// dimensions, obstruction count, one obstruction per line, pin-set
    /// count, then one pin set per line as `k x1 y1 .. xk yk`.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, ProblemError> {
        let mut lines = reader
            .lines()
            .enumerate()
            .filter_map(|(idx, line)| match line {
                Ok(l) if l.trim().is_empty() => None,
                Ok(l) => Some(Ok((idx + 1, l))),
                Err(e) => Some(Err(ProblemError::Syntax {
                    line: idx + 1,
                    reason: e.to_string(),
                })),
            });

        let mut next_line = move || -> Result<(usize, String), ProblemError> {
            lines.next().unwrap_or(Err(ProblemError::Syntax {
                line: 0,
                reason: "unexpected end of file".into(),
            }))
        };

        let (line_no, line) = next_line()?;
        let (dim_x, dim_y) = parse_int_pair(line_no, &line, "grid dimensions")?;

        let (line_no, line) = next_line()?;
        let num_obstructions = parse_count(line_no, &line, "obstruction count")?;
        let mut obstructions = Vec::with_capacity(num_obstructions);
        for _ in 0..num_obstructions {
            let (line_no, line) = next_line()?;
            let (x, y) = parse_int_pair(line_no, &line, "obstruction coordinates")?;
            obstructions.push(Coord::new(x, y));
        }

        let (line_no, line) = next_line()?;
        let num_pin_sets = parse_count(line_no, &line, "pin set count")?;
        let mut pin_sets = Vec::with_capacity(num_pin_sets);
        for _ in 0..num_pin_sets {
            let (line_no, line) = next_line()?;
            pin_sets.push(parse_pin_set(line_no, &line)?);
        }

        Ok(Self {
            dim_x,
            dim_y,
            obstructions,
            pin_sets,
        })
    }

    /// Semantic validity: positive dimensions, at least one pin set, all
    /// coordinates in bounds, no coordinate both pin and obstruction.
    pub fn validate(&self) -> Result<(), ProblemError> {
        if self.dim_x <= 0 || self.dim_y <= 0 {
            return Err(ProblemError::BadDimensions {
                dim_x: self.dim_x,
                dim_y: self.dim_y,
            });
        }
        if self.pin_sets.is_empty() {
            return Err(ProblemError::NoPinSets);
        }
        let check_bounds = |what: &'static str, coord: Coord| -> Result<(), ProblemError> {
            if coord.is_within_bounds(self.dim_x, self.dim_y) {
                Ok(())
            } else {
                Err(ProblemError::OutOfBounds {
                    what,
                    coord,
                    dim_x: self.dim_x,
                    dim_y: self.dim_y,
                })
            }
        };
        for &coord in &self.obstructions {
            check_bounds("obstruction", coord)?;
        }
        for pin_set in &self.pin_sets {
            for &coord in pin_set {
                check_bounds("pin", coord)?;
            }
        }
        for &obs in &self.obstructions {
            for pin_set in &self.pin_sets {
                if pin_set.contains(&obs) {
                    return Err(ProblemError::PinObstructionClash { coord: obs });
                }
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn dim_x(&self) -> i32 {
        self.dim_x
    }

    pub fn dim_y(&self) -> i32 {
        self.dim_y
    }

    pub fn obstructions(&self) -> &[Coord] {
        &self.obstructions
    }

    pub fn pin_sets(&self) -> &[PinSet] {
        &self.pin_sets
    }

    /// Build the unsolved grid for this problem.
    pub fn seed_grid(&self) -> Grid {
        Grid::new(self.dim_x, self.dim_y, &self.obstructions, &self.pin_sets)
    }
}

fn parse_count(line_no: usize, line: &str, what: &'static str) -> Result<usize, ProblemError> {
    line.trim()
        .parse::<usize>()
        .map_err(|_| ProblemError::Syntax {
            line: line_no,
            reason: format!("expected {what}, got '{}'", line.trim()),
        })
}

fn parse_int_pair(
    line_no: usize,
    line: &str,
    what: &'static str,
) -> Result<(i32, i32), ProblemError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 2 {
        return Err(ProblemError::Syntax {
            line: line_no,
            reason: format!("expected two values for {what}, got {}", fields.len()),
        });
    }
    let parse = |s: &str| -> Result<i32, ProblemError> {
        s.parse::<i32>().map_err(|_| ProblemError::Syntax {
            line: line_no,
            reason: format!("'{s}' is not an integer"),
        })
    };
    Ok((parse(fields[0])?, parse(fields[1])?))
}

fn parse_pin_set(line_no: usize, line: &str) -> Result<PinSet, ProblemError> {
    let mut fields = line.split_whitespace();
    let declared = fields
        .next()
        .ok_or_else(|| ProblemError::Syntax {
            line: line_no,
            reason: "empty pin set line".into(),
        })?
        .parse::<usize>()
        .map_err(|_| ProblemError::Syntax {
            line: line_no,
            reason: "pin set line must start with the pin count".into(),
        })?;
    let values: Vec<i32> = fields
        .map(|s| {
            s.parse::<i32>().map_err(|_| ProblemError::Syntax {
                line: line_no,
                reason: format!("'{s}' is not an integer"),
            })
        })
        .collect::<Result<_, _>>()?;
    if values.len() % 2 != 0 {
        return Err(ProblemError::Syntax {
            line: line_no,
            reason: "pin set line has an odd number of coordinates".into(),
        });
    }
    let pins: PinSet = values
        .chunks(2)
        .map(|xy| Coord::new(xy[0], xy[1]))
        .collect();
    if pins.len() != declared {
        return Err(ProblemError::CountMismatch {
            line: line_no,
            what: "pins",
            declared,
            found: pins.len(),
        });
    }
    Ok(pins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::core::CellType;

    const STRAIGHT_LINE: &str = "11 1\n0\n1\n2 0 0 10 0\n";
    const STRAIGHT_LINE_W_OBS: &str = "11 1\n3\n4 0\n5 0\n6 0\n1\n2 0 0 10 0\n";

    #[test]
    fn parses_straight_line_problem() {
        let problem = Problem::parse(STRAIGHT_LINE.as_bytes()).unwrap();
        assert!(problem.is_valid());
        assert_eq!(problem.dim_x(), 11);
        assert_eq!(problem.dim_y(), 1);
        assert!(problem.obstructions().is_empty());
        assert_eq!(
            problem.pin_sets(),
            &[vec![Coord::new(0, 0), Coord::new(10, 0)]]
        );

        let grid = problem.seed_grid();
        assert_eq!(grid.cell_at(Coord::new(0, 0)).kind, CellType::Pin);
        assert_eq!(grid.cell_at(Coord::new(0, 0)).pin_set_id, 0);
        assert_eq!(grid.cell_at(Coord::new(10, 0)).kind, CellType::Pin);
        for x in 1..10 {
            let cell = grid.cell_at(Coord::new(x, 0));
            assert_eq!(cell.kind, CellType::Blank);
            assert_eq!(cell.pin_set_id, -1);
        }
    }

    #[test]
    fn parses_obstructions() {
        let problem = Problem::parse(STRAIGHT_LINE_W_OBS.as_bytes()).unwrap();
        assert!(problem.is_valid());
        let grid = problem.seed_grid();
        for x in [4, 5, 6] {
            assert_eq!(grid.cell_at(Coord::new(x, 0)).kind, CellType::Obstruction);
        }
        for x in [1, 2, 3, 7, 8, 9] {
            assert_eq!(grid.cell_at(Coord::new(x, 0)).kind, CellType::Blank);
        }
    }

    #[test]
    fn rejects_pin_count_mismatch() {
        let err = Problem::parse("4 4\n0\n1\n3 0 0 3 3\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ProblemError::CountMismatch {
                declared: 3,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn rejects_truncated_file() {
        assert!(Problem::parse("4 4\n2\n1 1\n".as_bytes()).is_err());
    }

    #[test]
    fn rejects_non_numeric_input() {
        assert!(Problem::parse("4 x\n0\n1\n2 0 0 3 3\n".as_bytes()).is_err());
    }

    #[test]
    fn validate_flags_out_of_bounds_and_clashes() {
        let oob = Problem::new(4, 4, vec![], vec![vec![Coord::new(0, 0), Coord::new(4, 0)]]);
        assert!(matches!(
            oob.validate(),
            Err(ProblemError::OutOfBounds { .. })
        ));

        let clash = Problem::new(
            4,
            4,
            vec![Coord::new(1, 1)],
            vec![vec![Coord::new(1, 1), Coord::new(3, 3)]],
        );
        assert!(matches!(
            clash.validate(),
            Err(ProblemError::PinObstructionClash { .. })
        ));

        let empty = Problem::new(4, 4, vec![], vec![]);
        assert!(matches!(empty.validate(), Err(ProblemError::NoPinSets)));

        let dims = Problem::new(0, 4, vec![], vec![vec![Coord::new(0, 0)]]);
        assert!(matches!(
            dims.validate(),
            Err(ProblemError::BadDimensions { .. })
        ));
    }
}
