use crate::db::core::{Cell, CellType, ConnId, Connection, PinSet};
use crate::geom::coord::Coord;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};

/// Min-heap entry for the reachability search, ordered by remaining
/// Manhattan distance to the target. The coordinate participates in the
/// order so equal distances pop deterministically.
#[derive(Copy, Clone, Eq, PartialEq)]
struct ReachState {
    dist: i32,
    coord: Coord,
}

impl Ord for ReachState {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .cmp(&self.dist)
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

impl PartialOrd for ReachState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The routing surface: a dense 2-D array of cells plus the registry of
/// placed connections. Coordinates index the multimap `conn`; every
/// coordinate a connection covers maps to that connection's id, and a pin
/// shared by several connections appears once per connection.
///
/// Cloning a grid yields a fully independent copy; connection ids are
/// preserved, so restoring a snapshot is a plain clone-assign.
#[derive(Clone, Debug)]
pub struct Grid {
    dim_x: i32,
    dim_y: i32,
    cells: Vec<Cell>,
    pin_sets: BTreeMap<i32, PinSet>,
    conn: HashMap<Coord, Vec<ConnId>>,
    connections: HashMap<ConnId, Connection>,
    next_conn: u32,
}

impl Grid {
    pub fn new(dim_x: i32, dim_y: i32, obstructions: &[Coord], pin_sets: &[PinSet]) -> Self {
        let mut cells = Vec::with_capacity((dim_x * dim_y).max(0) as usize);
        for y in 0..dim_y {
            for x in 0..dim_x {
                cells.push(Cell::blank(Coord::new(x, y)));
            }
        }
        let mut grid = Self {
            dim_x,
            dim_y,
            cells,
            pin_sets: BTreeMap::new(),
            conn: HashMap::new(),
            connections: HashMap::new(),
            next_conn: 0,
        };
        grid.set_obstruction_cells(obstructions);
        for (id, pin_set) in pin_sets.iter().enumerate() {
            grid.set_pin_cells(pin_set, id as i32);
        }
        grid
    }

    pub fn dim_x(&self) -> i32 {
        self.dim_x
    }

    pub fn dim_y(&self) -> i32 {
        self.dim_y
    }

    pub fn pin_sets(&self) -> &BTreeMap<i32, PinSet> {
        &self.pin_sets
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline(always)]
    fn index(&self, coord: Coord) -> usize {
        (coord.y * self.dim_x + coord.x) as usize
    }

    #[inline(always)]
    pub fn is_within_bounds(&self, coord: Coord) -> bool {
        coord.is_within_bounds(self.dim_x, self.dim_y)
    }

    pub fn cell_at(&self, coord: Coord) -> &Cell {
        &self.cells[self.index(coord)]
    }

    pub fn cell_at_mut(&mut self, coord: Coord) -> &mut Cell {
        let idx = self.index(coord);
        &mut self.cells[idx]
    }

    fn set_obstruction_cells(&mut self, coords: &[Coord]) {
        for &coord in coords {
            let cell = self.cell_at_mut(coord);
            if cell.kind != CellType::Blank {
                log::warn!("cell clash while seeding obstruction at {}", coord);
            }
            cell.kind = CellType::Obstruction;
            cell.pin_set_id = -1;
        }
    }

    fn set_pin_cells(&mut self, coords: &[Coord], pin_set_id: i32) {
        for &coord in coords {
            let cell = self.cell_at_mut(coord);
            if cell.kind != CellType::Blank {
                log::warn!("cell clash while seeding pin at {}", coord);
            }
            cell.kind = CellType::Pin;
            cell.pin_set_id = pin_set_id;
        }
        self.pin_sets.insert(pin_set_id, coords.to_vec());
    }

    /// In-bounds neighbors in the fixed order left, right, above, below.
    /// Search frontiers and backtraces rely on this order for
    /// deterministic tie-breaking.
    pub fn neighbor_coords_of(&self, coord: Coord) -> Vec<Coord> {
        let mut neighbors = Vec::with_capacity(4);
        for n in [coord.left(), coord.right(), coord.above(), coord.below()] {
            if self.is_within_bounds(n) {
                neighbors.push(n);
            }
        }
        neighbors
    }

    /// Reset every cell's working value and search scratch.
    pub fn clear_working_values(&mut self) {
        for cell in &mut self.cells {
            cell.reset_working_value();
        }
    }

    /// Whether a monochromatic path of `Pin`/`Routed` cells of `a`'s pin
    /// set links `a` to `b`. Expansion is ordered by remaining Manhattan
    /// distance to `b`. When a path exists and `out_route` is supplied,
    /// the interior coordinates (endpoints excluded) are written to it in
    /// `a`-to-`b` order. Never touches cell scratch.
    pub fn route_exists_between_pins(
        &self,
        a: Coord,
        b: Coord,
        out_route: Option<&mut Vec<Coord>>,
    ) -> bool {
        if a == b {
            return true;
        }
        let pin_set_id = self.cell_at(a).pin_set_id;
        let mut heap = BinaryHeap::new();
        let mut came_from: HashMap<Coord, Coord> = HashMap::new();
        let mut visited: HashSet<Coord> = HashSet::new();
        visited.insert(a);
        heap.push(ReachState {
            dist: a.manhattan_distance(b),
            coord: a,
        });
        while let Some(ReachState { coord, .. }) = heap.pop() {
            if coord == b {
                if let Some(route) = out_route {
                    let mut cursor = *came_from.get(&b).expect("reached b without predecessor");
                    while cursor != a {
                        route.push(cursor);
                        cursor = came_from[&cursor];
                    }
                    route.reverse();
                }
                return true;
            }
            for n in self.neighbor_coords_of(coord) {
                if visited.contains(&n) {
                    continue;
                }
                let cell = self.cell_at(n);
                let conductive = matches!(cell.kind, CellType::Pin | CellType::Routed)
                    && cell.pin_set_id == pin_set_id;
                if conductive {
                    visited.insert(n);
                    came_from.insert(n, coord);
                    heap.push(ReachState {
                        dist: n.manhattan_distance(b),
                        coord: n,
                    });
                }
            }
        }
        false
    }

    /// Exhaustive completion check: every consecutive pin pair of every
    /// set must be linked by routed cells. O(pins x grid); meant to run
    /// once at the end of a suite.
    pub fn all_pins_routed(&self) -> bool {
        for pin_set in self.pin_sets.values() {
            for pair in pin_set.windows(2) {
                if !self.route_exists_between_pins(pair[0], pair[1], None) {
                    return false;
                }
            }
        }
        true
    }

    /// Number of registered connections.
    pub fn count_segments(&self) -> usize {
        self.connections.len()
    }

    /// Count cells whose type appears in `types`. An empty slice counts
    /// every cell.
    pub fn count_cells(&self, types: &[CellType]) -> usize {
        if types.is_empty() {
            return self.cells.len();
        }
        self.cells
            .iter()
            .filter(|c| types.contains(&c.kind))
            .count()
    }

    pub fn connection(&self, id: ConnId) -> &Connection {
        &self.connections[&id]
    }

    pub fn connection_ids(&self) -> impl Iterator<Item = ConnId> + '_ {
        self.connections.keys().copied()
    }

    /// Connections covering a coordinate, in registration order.
    pub fn connections_at(&self, coord: Coord) -> &[ConnId] {
        self.conn.get(&coord).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Register a connection: intern it, index every covered coordinate,
    /// and convert blank cells along the route to `Routed` cells of the
    /// connection's pin set. Pins keep their type.
    pub fn add_connection(&mut self, connection: Connection) -> ConnId {
        let id = ConnId(self.next_conn);
        self.next_conn += 1;
        for &coord in &connection.routed_cells {
            self.conn.entry(coord).or_default().push(id);
            let pin_set_id = connection.pin_set_id;
            let cell = self.cell_at_mut(coord);
            if cell.kind == CellType::Blank {
                cell.kind = CellType::Routed;
                cell.pin_set_id = pin_set_id;
            }
        }
        self.connections.insert(id, connection);
        id
    }

    /// Remove a connection and free every cell no other connection still
    /// covers, reverting it to blank (pins keep their type and set).
    /// A missing registry or multimap entry is a corrupted grid and
    /// aborts.
    pub fn rip_connection(&mut self, id: ConnId) -> Connection {
        let connection = match self.connections.remove(&id) {
            Some(c) => c,
            None => panic!("rip of unregistered connection {:?}", id),
        };
        for &coord in &connection.routed_cells {
            let remaining = {
                let ids = self
                    .conn
                    .get_mut(&coord)
                    .unwrap_or_else(|| panic!("no connection entries at {} for {:?}", coord, id));
                let pos = ids
                    .iter()
                    .position(|&c| c == id)
                    .unwrap_or_else(|| panic!("connection {:?} not indexed at {}", id, coord));
                ids.remove(pos);
                ids.len()
            };
            if remaining == 0 {
                self.conn.remove(&coord);
                let cell = self.cell_at_mut(coord);
                if cell.kind != CellType::Pin {
                    cell.kind = CellType::Blank;
                    cell.pin_set_id = -1;
                }
            }
        }
        connection
    }
}
