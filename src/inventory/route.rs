//! Direction and coordinate routing for the simulated inventories.
//!
//! The harness pretends the player stands in a block with a container on each of
//! its six faces. A command names one of them either by direction token
//! (`north`, `up`, ...) or, from the collaborator side, by a unit offset. Both
//! funnel through [resolve_container], which is the only place the fixed
//! coordinate ↔ container table lives.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{HarnessError, HarnessResult};

/// One of the seven simulated inventories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerId {
    /// The player's own inventory.
    Local,
    Up,
    Down,
    North,
    East,
    West,
    South,
}

impl ContainerId {
    pub const ALL: [ContainerId; 7] = [
        ContainerId::Local,
        ContainerId::Up,
        ContainerId::Down,
        ContainerId::North,
        ContainerId::East,
        ContainerId::West,
        ContainerId::South,
    ];

    /// Stable slot index into [crate::inventory::ContainerStore].
    pub fn index(self) -> usize {
        match self {
            ContainerId::Local => 0,
            ContainerId::Up => 1,
            ContainerId::Down => 2,
            ContainerId::North => 3,
            ContainerId::East => 4,
            ContainerId::West => 5,
            ContainerId::South => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ContainerId::Local => "self",
            ContainerId::Up => "up",
            ContainerId::Down => "down",
            ContainerId::North => "north",
            ContainerId::East => "east",
            ContainerId::West => "west",
            ContainerId::South => "south",
        }
    }

    /// Inverse of [resolve_container]: y is vertical, north is -z.
    pub fn coordinate(self) -> Coordinate {
        match self {
            ContainerId::Local => Coordinate::ORIGIN,
            ContainerId::Up => Coordinate::new(0, 1, 0),
            ContainerId::Down => Coordinate::new(0, -1, 0),
            ContainerId::North => Coordinate::new(0, 0, -1),
            ContainerId::East => Coordinate::new(1, 0, 0),
            ContainerId::West => Coordinate::new(-1, 0, 0),
            ContainerId::South => Coordinate::new(0, 0, 1),
        }
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerId::Local => f.write_str("your inventory"),
            other => write!(f, "the {} inventory", other.name()),
        }
    }
}

/// Offset from the player to a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub dx: i32,
    pub dy: i32,
    pub dz: i32,
}

impl Coordinate {
    pub const ORIGIN: Coordinate = Coordinate::new(0, 0, 0);

    pub const fn new(dx: i32, dy: i32, dz: i32) -> Self {
        Self { dx, dy, dz }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.dx, self.dy, self.dz)
    }
}

/// Map a direction token to its offset. Case-insensitive; single letters allowed.
pub fn resolve_coordinate(token: &str) -> HarnessResult<Coordinate> {
    let id = match token.to_ascii_lowercase().as_str() {
        "none" | "self" => ContainerId::Local,
        "up" | "u" => ContainerId::Up,
        "down" | "d" => ContainerId::Down,
        "north" | "n" => ContainerId::North,
        "east" | "e" => ContainerId::East,
        "west" | "w" => ContainerId::West,
        "south" | "s" => ContainerId::South,
        _ => return Err(HarnessError::Routing(token.to_string())),
    };
    Ok(id.coordinate())
}

/// Resolve an optional offset to exactly one container. `None` is the player.
pub fn resolve_container(coordinate: Option<Coordinate>) -> HarnessResult<ContainerId> {
    let Some(c) = coordinate else {
        return Ok(ContainerId::Local);
    };
    let id = match (c.dx, c.dy, c.dz) {
        (0, 0, 0) => ContainerId::Local,
        (0, 1, 0) => ContainerId::Up,
        (0, -1, 0) => ContainerId::Down,
        (0, 0, -1) => ContainerId::North,
        (1, 0, 0) => ContainerId::East,
        (-1, 0, 0) => ContainerId::West,
        (0, 0, 1) => ContainerId::South,
        _ => return Err(HarnessError::Routing(c.to_string())),
    };
    Ok(id)
}

/// Token → container in one step, the form command handlers use.
pub fn resolve_direction(token: Option<&str>) -> HarnessResult<ContainerId> {
    match token {
        None => Ok(ContainerId::Local),
        Some(t) => resolve_container(Some(resolve_coordinate(t)?)),
    }
}

pub fn is_direction(token: &str) -> bool {
    resolve_coordinate(token).is_ok()
}
