use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    StairDown,
    StairUp,
    Hole,
    Ascend,
    Cistern,
    Pitfall,
    Door,
}

impl PortKind {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::StairDown => "stairdown",
            Self::StairUp => "stairup",
            Self::Hole => "hole",
            Self::Ascend => "ascend",
            Self::Cistern => "cistern",
            Self::Pitfall => "pitfall",
            Self::Door => "door",
        }
    }

    fn from_token(value: &str) -> Option<Self> {
        match value {
            "stairdown" => Some(Self::StairDown),
            "stairup" => Some(Self::StairUp),
            "hole" => Some(Self::Hole),
            "ascend" => Some(Self::Ascend),
            "cistern" => Some(Self::Cistern),
            "pitfall" => Some(Self::Pitfall),
            "door" => Some(Self::Door),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    House,
    Shack,
    Well,
    Ruins,
}

impl StructureKind {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::House => "house",
            Self::Shack => "shack",
            Self::Well => "well",
            Self::Ruins => "ruins",
        }
    }

    fn from_token(value: &str) -> Option<Self> {
        match value {
            "house" => Some(Self::House),
            "shack" => Some(Self::Shack),
            "well" => Some(Self::Well),
            "ruins" => Some(Self::Ruins),
            _ => None,
        }
    }
}

/// One grid cell. Plain terrain is a unit variant; anything carrying state is
/// a record variant so the discriminant always travels with the data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tile {
    #[default]
    Floor,
    Grass,
    Wall,
    Rock,
    Shrub,
    Tree,
    Water,
    Exit,
    Port {
        kind: PortKind,
    },
    Structure {
        kind: StructureKind,
    },
    Item {
        id: String,
    },
    Npc {
        id: String,
    },
    Bomb {
        actions_since_placed: u32,
    },
    Custom {
        id: String,
    },
}

impl Tile {
    pub fn port(kind: PortKind) -> Self {
        Self::Port { kind }
    }

    pub fn structure(kind: StructureKind) -> Self {
        Self::Structure { kind }
    }

    pub fn item(id: impl Into<String>) -> Self {
        Self::Item { id: id.into() }
    }

    pub fn npc(id: impl Into<String>) -> Self {
        Self::Npc { id: id.into() }
    }

    /// Parses an authored tag such as `"wall"`, `"stairdown"`, `"item:food"`.
    /// Tags the catalog does not know survive as `Custom` rather than failing.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim();
        if let Some(id) = tag.strip_prefix("item:") {
            return Self::item(id);
        }
        if let Some(id) = tag.strip_prefix("npc:") {
            return Self::npc(id);
        }
        match tag {
            "floor" | "" => Self::Floor,
            "grass" => Self::Grass,
            "wall" => Self::Wall,
            "rock" => Self::Rock,
            "shrub" => Self::Shrub,
            "tree" => Self::Tree,
            "water" => Self::Water,
            "exit" => Self::Exit,
            "bomb" => Self::Bomb {
                actions_since_placed: 0,
            },
            other => {
                if let Some(kind) = PortKind::from_token(other) {
                    Self::port(kind)
                } else if let Some(kind) = StructureKind::from_token(other) {
                    Self::structure(kind)
                } else {
                    Self::Custom {
                        id: other.to_string(),
                    }
                }
            }
        }
    }

    pub fn texture_id(&self) -> String {
        match self {
            Self::Floor => "floor".to_string(),
            Self::Grass => "grass".to_string(),
            Self::Wall => "wall".to_string(),
            Self::Rock => "rock".to_string(),
            Self::Shrub => "shrub".to_string(),
            Self::Tree => "tree".to_string(),
            Self::Water => "water".to_string(),
            Self::Exit => "exit".to_string(),
            Self::Port { kind } => kind.as_token().to_string(),
            Self::Structure { kind } => kind.as_token().to_string(),
            Self::Item { id } => format!("item:{id}"),
            Self::Npc { id } => format!("npc:{id}"),
            Self::Bomb { .. } => "bomb".to_string(),
            Self::Custom { id } => id.clone(),
        }
    }

    pub fn is_passable(&self) -> bool {
        matches!(
            self,
            Self::Floor | Self::Grass | Self::Exit | Self::Port { .. } | Self::Item { .. }
        )
    }

    /// Bare ground that content may be spawned onto.
    pub fn is_open_ground(&self) -> bool {
        matches!(self, Self::Floor | Self::Grass)
    }

    /// Obstacles that exit carving and bomb blasts are allowed to clear.
    pub fn is_clearable(&self) -> bool {
        matches!(self, Self::Rock | Self::Shrub | Self::Tree | Self::Wall)
    }
}
