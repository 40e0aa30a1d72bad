//! Arena Geometry
//!
//! Static per-match geometry: bounds, obstacle cells, the den and spawn
//! points. An [`Arena`] only exists after its [`ArenaDefinition`] passed
//! validation, so the rest of the engine never checks for degraded maps.
//!
//! ```text
//!  (0,0) ───────────────────────────────► x           w
//!    │   ┌──┐                                         │
//!    │   │▓▓│ wall (opaque, solid)    ┌──┐            │
//!    │   └──┘                         │♣ │ tree       │
//!    │              ( den )           └──┘ (solid,    │
//!    │             center, r                transparent)
//!    ▼ y                                              h
//! ```
//!
//! Every obstacle and player occupies a `cell_size` square whose top-left
//! corner is its position. Movement collision uses strict box overlap;
//! sight blocking uses the closed footprint of opaque obstacles.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::fixed::{Fixed, DEFAULT_CELL_SIZE, MAX_WORLD_VALUE, from_float};
use crate::core::vec2::FixedVec2;
use crate::core::rng::DeterministicRng;

// =============================================================================
// ERRORS
// =============================================================================

/// A definition that cannot produce a playable arena.
#[derive(Debug, Error)]
pub enum ArenaError {
    /// Definition file could not be read
    #[error("cannot read arena definition {path}: {source}")]
    Read {
        /// File path
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// JSON did not match the definition shape (includes unknown obstacle types)
    #[error("malformed arena definition: {0}")]
    Parse(#[from] serde_json::Error),

    /// Width or height not positive
    #[error("arena bounds must be positive, got {w}x{h}")]
    InvalidBounds {
        /// Width
        w: f64,
        /// Height
        h: f64,
    },

    /// Cell size not positive
    #[error("cell size must be positive, got {0}")]
    InvalidCellSize(f64),

    /// Den radius not positive
    #[error("den radius must be positive, got {0}")]
    InvalidDenRadius(f64),

    /// Den center outside the arena
    #[error("den center ({x}, {y}) lies outside the arena")]
    DenOutOfBounds {
        /// X
        x: f64,
        /// Y
        y: f64,
    },

    /// The grid cell seekers start in is not free
    #[error("den start cell is blocked or out of bounds")]
    DenBlocked,

    /// No spawn points at all
    #[error("arena has no spawn points")]
    NoSpawnPoints,

    /// A spawn point snaps onto an obstacle or outside the arena
    #[error("spawn point {index} is blocked or out of bounds")]
    SpawnBlocked {
        /// Index into `spawnPoints`
        index: usize,
    },

    /// An obstacle does not fit inside the arena
    #[error("obstacle {index} lies outside the arena")]
    ObstacleOutOfBounds {
        /// Index into `obstacles`
        index: usize,
    },

    /// A coordinate is NaN or infinite
    #[error("non-finite coordinate in arena definition")]
    NonFinite,

    /// A value is too large for fixed-point world coordinates
    #[error("{field} = {value} exceeds the world limit of {}", MAX_WORLD_VALUE)]
    OutOfRange {
        /// Which value
        field: &'static str,
        /// Offending value
        value: f64,
    },
}

// =============================================================================
// OBSTACLES
// =============================================================================

/// Obstacle type. Every type blocks movement; only walls and buildings
/// block sight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleKind {
    /// Opaque
    Wall,
    /// Solid, see-through
    Door,
    /// Solid, see-through
    Tree,
    /// Solid, see-through
    Car,
    /// Opaque
    Building,
    /// Solid, see-through
    Locker,
    /// Solid, see-through
    Barrel,
}

impl ObstacleKind {
    /// Blocks line of sight.
    #[inline]
    pub fn is_opaque(self) -> bool {
        matches!(self, ObstacleKind::Wall | ObstacleKind::Building)
    }
}

/// A placed obstacle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Obstacle {
    /// Type
    pub kind: ObstacleKind,
    /// Top-left corner
    pub origin: FixedVec2,
}

/// Strict overlap of two `size` squares given their top-left corners.
#[inline]
pub fn boxes_overlap(a: FixedVec2, b: FixedVec2, size: Fixed) -> bool {
    let size = size.max(0).unsigned_abs();
    a.x.abs_diff(b.x) < size && a.y.abs_diff(b.y) < size
}

// =============================================================================
// DEFINITION (read contract)
// =============================================================================

/// Point in float world units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointDef {
    /// X
    pub x: f64,
    /// Y
    pub y: f64,
}

/// Arena size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundsDef {
    /// Width
    pub w: f64,
    /// Height
    pub h: f64,
}

/// One obstacle entry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObstacleDef {
    /// Obstacle type
    #[serde(rename = "type")]
    pub kind: ObstacleKind,
    /// Top-left corner
    pub cell: PointDef,
}

/// Den zone.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DenZoneDef {
    /// Center point
    pub cell: PointDef,
    /// Radius in world units
    pub radius: f64,
}

/// Arena definition as delivered by the world-authoring collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaDefinition {
    /// Size
    pub bounds: BoundsDef,
    /// Obstacles
    #[serde(default)]
    pub obstacles: Vec<ObstacleDef>,
    /// Den
    pub den_zone: DenZoneDef,
    /// Candidate hider spawns
    pub spawn_points: Vec<PointDef>,
    /// Grid cell edge (default 20)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_size: Option<f64>,
}

impl ArenaDefinition {
    /// Empty arena with a den and no spawn points.
    pub fn new(w: f64, h: f64, den_x: f64, den_y: f64, den_radius: f64) -> Self {
        Self {
            bounds: BoundsDef { w, h },
            obstacles: Vec::new(),
            den_zone: DenZoneDef {
                cell: PointDef { x: den_x, y: den_y },
                radius: den_radius,
            },
            spawn_points: Vec::new(),
            cell_size: None,
        }
    }

    /// Add an obstacle.
    pub fn with_obstacle(mut self, kind: ObstacleKind, x: f64, y: f64) -> Self {
        self.obstacles.push(ObstacleDef { kind, cell: PointDef { x, y } });
        self
    }

    /// Add a spawn point.
    pub fn with_spawn(mut self, x: f64, y: f64) -> Self {
        self.spawn_points.push(PointDef { x, y });
        self
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self, ArenaError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate and build the runtime arena.
    pub fn build(&self) -> Result<Arena, ArenaError> {
        Arena::from_definition(self)
    }
}

// =============================================================================
// ARENA
// =============================================================================

/// Outcome of a spawn selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnChoice {
    /// Grid-snapped position
    pub position: FixedVec2,
    /// False when no spawn point met the minimum distance and the
    /// farthest one was used instead
    pub qualified: bool,
}

/// Validated, immutable arena.
#[derive(Clone, Debug)]
pub struct Arena {
    width: Fixed,
    height: Fixed,
    cell_size: Fixed,
    obstacles: Vec<Obstacle>,
    den_center: FixedVec2,
    den_radius: Fixed,
    spawn_points: Vec<FixedVec2>,
    blocked_cells: BTreeSet<(i32, i32)>,
    cols: i32,
    rows: i32,
}

impl Arena {
    /// Parse and validate a JSON definition.
    pub fn from_json(json: &str) -> Result<Self, ArenaError> {
        ArenaDefinition::from_json(json)?.build()
    }

    /// Load and validate a definition file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ArenaError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ArenaError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Validate a definition.
    pub fn from_definition(def: &ArenaDefinition) -> Result<Self, ArenaError> {
        let finite = |p: &PointDef| p.x.is_finite() && p.y.is_finite();
        if !def.bounds.w.is_finite()
            || !def.bounds.h.is_finite()
            || !def.den_zone.radius.is_finite()
            || !finite(&def.den_zone.cell)
            || !def.obstacles.iter().all(|o| finite(&o.cell))
            || !def.spawn_points.iter().all(finite)
        {
            return Err(ArenaError::NonFinite);
        }

        check_range(&[
            ("bounds.w", def.bounds.w),
            ("bounds.h", def.bounds.h),
            ("cellSize", def.cell_size.unwrap_or(0.0)),
            ("denZone.radius", def.den_zone.radius),
            ("denZone.cell.x", def.den_zone.cell.x),
            ("denZone.cell.y", def.den_zone.cell.y),
        ])?;
        for o in &def.obstacles {
            check_range(&[("obstacles.cell.x", o.cell.x), ("obstacles.cell.y", o.cell.y)])?;
        }
        for p in &def.spawn_points {
            check_range(&[("spawnPoints.x", p.x), ("spawnPoints.y", p.y)])?;
        }

        if def.bounds.w <= 0.0 || def.bounds.h <= 0.0 {
            return Err(ArenaError::InvalidBounds { w: def.bounds.w, h: def.bounds.h });
        }
        let cell_size_f = def.cell_size.unwrap_or(20.0);
        if !cell_size_f.is_finite() || cell_size_f <= 0.0 {
            return Err(ArenaError::InvalidCellSize(cell_size_f));
        }
        if def.den_zone.radius <= 0.0 {
            return Err(ArenaError::InvalidDenRadius(def.den_zone.radius));
        }

        let cell_size = match def.cell_size {
            Some(c) => from_float(c),
            None => DEFAULT_CELL_SIZE,
        };
        let width = from_float(def.bounds.w);
        let height = from_float(def.bounds.h);

        let den = &def.den_zone.cell;
        if den.x < 0.0 || den.y < 0.0 || den.x > def.bounds.w || den.y > def.bounds.h {
            return Err(ArenaError::DenOutOfBounds { x: den.x, y: den.y });
        }
        if def.spawn_points.is_empty() {
            return Err(ArenaError::NoSpawnPoints);
        }

        let mut arena = Self {
            width,
            height,
            cell_size,
            obstacles: Vec::with_capacity(def.obstacles.len()),
            den_center: FixedVec2::from_floats(den.x, den.y),
            den_radius: from_float(def.den_zone.radius),
            spawn_points: def
                .spawn_points
                .iter()
                .map(|p| FixedVec2::from_floats(p.x, p.y))
                .collect(),
            blocked_cells: BTreeSet::new(),
            cols: (width / cell_size.max(1)).max(0),
            rows: (height / cell_size.max(1)).max(0),
        };

        for (index, o) in def.obstacles.iter().enumerate() {
            let origin = FixedVec2::from_floats(o.cell.x, o.cell.y);
            if !arena.in_bounds(origin) {
                return Err(ArenaError::ObstacleOutOfBounds { index });
            }
            arena.obstacles.push(Obstacle { kind: o.kind, origin });
        }

        for row in 0..arena.rows {
            for col in 0..arena.cols {
                let origin = arena.cell_origin(col, row);
                if !arena.is_free(origin) {
                    arena.blocked_cells.insert((col, row));
                }
            }
        }

        if !arena.is_free(arena.den_start()) {
            return Err(ArenaError::DenBlocked);
        }
        for (index, spawn) in arena.spawn_points.iter().enumerate() {
            if !arena.is_free(spawn.snap(arena.cell_size)) {
                return Err(ArenaError::SpawnBlocked { index });
            }
        }

        Ok(arena)
    }

    /// Arena width.
    #[inline]
    pub fn width(&self) -> Fixed {
        self.width
    }

    /// Arena height.
    #[inline]
    pub fn height(&self) -> Fixed {
        self.height
    }

    /// Grid cell edge.
    #[inline]
    pub fn cell_size(&self) -> Fixed {
        self.cell_size
    }

    /// Den center.
    #[inline]
    pub fn den_center(&self) -> FixedVec2 {
        self.den_center
    }

    /// Den radius as authored.
    #[inline]
    pub fn den_radius(&self) -> Fixed {
        self.den_radius
    }

    /// All obstacles.
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Raw spawn points (unsnapped).
    pub fn spawn_points(&self) -> &[FixedVec2] {
        &self.spawn_points
    }

    /// Grid size in cells.
    #[inline]
    pub fn grid_dims(&self) -> (i32, i32) {
        (self.cols, self.rows)
    }

    /// The player box at `pos` lies fully inside the arena.
    #[inline]
    pub fn in_bounds(&self, pos: FixedVec2) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && pos.x <= self.width - self.cell_size
            && pos.y <= self.height - self.cell_size
    }

    /// The player box at `pos` strictly overlaps any obstacle.
    pub fn overlaps_obstacle(&self, pos: FixedVec2) -> bool {
        self.obstacles
            .iter()
            .any(|o| boxes_overlap(pos, o.origin, self.cell_size))
    }

    /// In bounds and touching no obstacle.
    #[inline]
    pub fn is_free(&self, pos: FixedVec2) -> bool {
        self.in_bounds(pos) && !self.overlaps_obstacle(pos)
    }

    /// Largest legal top-left corner.
    #[inline]
    pub fn max_position(&self) -> FixedVec2 {
        FixedVec2::new(self.width - self.cell_size, self.height - self.cell_size)
    }

    /// Clamp a position into the legal range of top-left corners.
    #[inline]
    pub fn clamp_to_bounds(&self, pos: FixedVec2) -> FixedVec2 {
        pos.clamp_box(FixedVec2::ZERO, self.max_position())
    }

    /// `point` lies inside (or on the edge of) an opaque obstacle.
    pub fn blocks_sight(&self, point: FixedVec2) -> bool {
        self.obstacles.iter().any(|o| {
            o.kind.is_opaque()
                && point.x >= o.origin.x
                && point.x - o.origin.x <= self.cell_size
                && point.y >= o.origin.y
                && point.y - o.origin.y <= self.cell_size
        })
    }

    /// Top-left corner of grid cell `(col, row)`.
    #[inline]
    pub fn cell_origin(&self, col: i32, row: i32) -> FixedVec2 {
        FixedVec2::new(col * self.cell_size, row * self.cell_size)
    }

    /// Grid cell exists and a player box there touches no obstacle.
    #[inline]
    pub fn is_cell_free(&self, col: i32, row: i32) -> bool {
        col >= 0
            && row >= 0
            && col < self.cols
            && row < self.rows
            && !self.blocked_cells.contains(&(col, row))
    }

    /// Grid-snapped den center; where seekers start.
    #[inline]
    pub fn den_start(&self) -> FixedVec2 {
        self.den_center.snap(self.cell_size)
    }

    /// `pos` is within `radius` of the den center (inclusive).
    #[inline]
    pub fn is_at_den(&self, pos: FixedVec2, radius: Fixed) -> bool {
        pos.within(self.den_center, radius)
    }

    /// Pick a hider spawn.
    ///
    /// Uniform among snapped spawn points at least `min_distance` from the
    /// den. When none qualifies, the spawn farthest from the den is used
    /// (first one wins ties) and `qualified` is false.
    pub fn select_spawn(&self, min_distance: Fixed, rng: &mut DeterministicRng) -> SpawnChoice {
        let snapped: Vec<FixedVec2> = self
            .spawn_points
            .iter()
            .map(|p| p.snap(self.cell_size))
            .collect();

        let eligible: Vec<FixedVec2> = snapped
            .iter()
            .copied()
            .filter(|p| !p.strictly_within(self.den_center, min_distance))
            .collect();

        if let Some(position) = rng.choose(&eligible) {
            return SpawnChoice { position: *position, qualified: true };
        }

        let mut best = self.den_start();
        let mut best_dist = -1i64;
        for p in &snapped {
            let d = p.distance_squared(self.den_center);
            if d > best_dist {
                best = *p;
                best_dist = d;
            }
        }
        SpawnChoice { position: best, qualified: false }
    }
}

fn check_range(values: &[(&'static str, f64)]) -> Result<(), ArenaError> {
    match values.iter().find(|(_, v)| v.abs() > MAX_WORLD_VALUE) {
        Some(&(field, value)) => Err(ArenaError::OutOfRange { field, value }),
        None => Ok(()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
