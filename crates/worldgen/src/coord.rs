use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Surface,
    Interior,
    Underground,
}

impl Dimension {
    pub fn index(self) -> u8 {
        match self {
            Self::Surface => 0,
            Self::Interior => 1,
            Self::Underground => 2,
        }
    }

    pub fn from_index(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Surface),
            1 => Some(Self::Interior),
            2 => Some(Self::Underground),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::Surface => "surface",
            Self::Interior => "interior",
            Self::Underground => "underground",
        }
    }

    pub fn from_token(value: &str) -> Option<Self> {
        match value {
            "surface" => Some(Self::Surface),
            "interior" => Some(Self::Interior),
            "underground" => Some(Self::Underground),
            _ => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    North,
    South,
    East,
    West,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::North, Side::South, Side::East, Side::West];

    pub fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }

    /// Zone-grid delta of the neighbor across this side. North is `y - 1`.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::South => (0, 1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
        }
    }
}

/// Zone address. `depth` is only meaningful underground and is normalized to
/// zero in the other dimensions so equal zones always compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ZoneCoordinate {
    pub x: i32,
    pub y: i32,
    pub dimension: Dimension,
    pub depth: u32,
}

impl ZoneCoordinate {
    pub fn surface(x: i32, y: i32) -> Self {
        Self::new(x, y, Dimension::Surface, 0)
    }

    pub fn interior(x: i32, y: i32) -> Self {
        Self::new(x, y, Dimension::Interior, 0)
    }

    pub fn underground(x: i32, y: i32, depth: u32) -> Self {
        Self::new(x, y, Dimension::Underground, depth)
    }

    pub fn new(x: i32, y: i32, dimension: Dimension, depth: u32) -> Self {
        let depth = match dimension {
            Dimension::Underground => depth.max(1),
            Dimension::Surface | Dimension::Interior => 0,
        };
        Self {
            x,
            y,
            dimension,
            depth,
        }
    }

    /// The zone across `side`, or `None` past the edge of the coordinate space.
    pub fn checked_neighbor(self, side: Side) -> Option<Self> {
        let (dx, dy) = side.delta();
        Some(Self {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
            ..self
        })
    }

    /// Like `checked_neighbor`, but the outermost zones are their own
    /// neighbor across the world edge.
    pub fn neighbor(self, side: Side) -> Self {
        self.checked_neighbor(side).unwrap_or(self)
    }

    pub fn below(self) -> Option<Self> {
        match self.dimension {
            Dimension::Underground => self
                .depth
                .checked_add(1)
                .map(|depth| Self::underground(self.x, self.y, depth)),
            Dimension::Surface => Some(Self::underground(self.x, self.y, 1)),
            Dimension::Interior => None,
        }
    }

    pub fn key(&self) -> String {
        self.to_string()
    }

    pub fn chebyshev_distance(&self, x: i32, y: i32) -> u32 {
        self.x.abs_diff(x).max(self.y.abs_diff(y))
    }
}

impl fmt::Display for ZoneCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dimension {
            Dimension::Underground => write!(
                f,
                "{},{},{},{}",
                self.x,
                self.y,
                self.dimension.index(),
                self.depth
            ),
            Dimension::Surface | Dimension::Interior => {
                write!(f, "{},{},{}", self.x, self.y, self.dimension.index())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZoneKeyError {
    #[error("zone key '{key}' must have 3 or 4 comma-separated fields")]
    FieldCount { key: String },
    #[error("zone key '{key}' has a non-integer field '{field}'")]
    NotAnInteger { key: String, field: String },
    #[error("zone key '{key}' names unknown dimension {value}")]
    UnknownDimension { key: String, value: u8 },
}

impl FromStr for ZoneCoordinate {
    type Err = ZoneKeyError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let fields = key.split(',').map(str::trim).collect::<Vec<_>>();
        if !(3..=4).contains(&fields.len()) {
            return Err(ZoneKeyError::FieldCount {
                key: key.to_string(),
            });
        }
        let int = |field: &str| {
            field
                .parse::<i64>()
                .map_err(|_| ZoneKeyError::NotAnInteger {
                    key: key.to_string(),
                    field: field.to_string(),
                })
        };
        let axis = |field: &str| {
            field
                .parse::<i32>()
                .map_err(|_| ZoneKeyError::NotAnInteger {
                    key: key.to_string(),
                    field: field.to_string(),
                })
        };
        let x = axis(fields[0])?;
        let y = axis(fields[1])?;
        let raw_dimension = int(fields[2])?;
        let dimension = u8::try_from(raw_dimension)
            .ok()
            .and_then(Dimension::from_index)
            .ok_or(ZoneKeyError::UnknownDimension {
                key: key.to_string(),
                value: raw_dimension.clamp(0, u8::MAX as i64) as u8,
            })?;
        let depth = match fields.get(3) {
            Some(field) => int(field)?.clamp(0, i64::from(u32::MAX)) as u32,
            None => 1,
        };
        Ok(Self::new(x, y, dimension, depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_encoding_round_trips_every_dimension() {
        for coord in [
            ZoneCoordinate::surface(-3, 7),
            ZoneCoordinate::interior(0, 0),
            ZoneCoordinate::underground(2, -1, 4),
        ] {
            let parsed = coord.key().parse::<ZoneCoordinate>().expect("parse");
            assert_eq!(parsed, coord);
        }
    }

    #[test]
    fn underground_key_defaults_depth_to_one() {
        let parsed = "5,5,2".parse::<ZoneCoordinate>().expect("parse");
        assert_eq!(parsed, ZoneCoordinate::underground(5, 5, 1));
        assert_eq!(ZoneCoordinate::interior(0, 0).key(), "0,0,1");
    }

    #[test]
    fn depth_is_ignored_outside_underground() {
        assert_eq!(
            ZoneCoordinate::new(1, 1, Dimension::Surface, 9),
            ZoneCoordinate::surface(1, 1)
        );
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(matches!(
            "1,2".parse::<ZoneCoordinate>(),
            Err(ZoneKeyError::FieldCount { .. })
        ));
        assert!(matches!(
            "1,b,0".parse::<ZoneCoordinate>(),
            Err(ZoneKeyError::NotAnInteger { .. })
        ));
        assert!(matches!(
            "1,2,7".parse::<ZoneCoordinate>(),
            Err(ZoneKeyError::UnknownDimension { value: 7, .. })
        ));
    }

    #[test]
    fn ordering_follows_tuple_order() {
        let a = ZoneCoordinate::surface(0, 5);
        let b = ZoneCoordinate::surface(1, 0);
        assert!(a < b);
        assert_eq!(Side::East.opposite(), Side::West);
        assert_eq!(a.neighbor(Side::North), ZoneCoordinate::surface(0, 4));
    }

    #[test]
    fn neighbors_stop_at_the_edge_of_the_coordinate_space() {
        let east_edge = ZoneCoordinate::surface(i32::MAX, 0);
        assert_eq!(east_edge.checked_neighbor(Side::East), None);
        assert_eq!(east_edge.neighbor(Side::East), east_edge);
        assert_eq!(
            east_edge.checked_neighbor(Side::West),
            Some(ZoneCoordinate::surface(i32::MAX - 1, 0))
        );

        let north_edge = ZoneCoordinate::underground(0, i32::MIN, 2);
        assert_eq!(north_edge.checked_neighbor(Side::North), None);
        assert_eq!(north_edge.neighbor(Side::South).y, i32::MIN + 1);

        assert_eq!(ZoneCoordinate::underground(0, 0, u32::MAX).below(), None);
        assert!(matches!(
            "4294967296,0,0".parse::<ZoneCoordinate>(),
            Err(ZoneKeyError::NotAnInteger { .. })
        ));
    }
}
