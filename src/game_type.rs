use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Game types known to the portal. Only some of them speak a protocol this
/// crate implements, see [GameType::engine].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameType {
    Unknown,
    CallOfDuty2,
    CallOfDuty4,
    CallOfDuty5,
    Insurgency,
    Minecraft,
    Arma,
    Arma2,
    Arma3,
    Battlefield1,
    Rust,
    Left4Dead2,
}

/// Engine family a game type's wire protocols derive from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Quake3,
    Source,
}

impl GameType {
    pub fn engine(&self) -> Option<Engine> {
        match self {
            GameType::CallOfDuty2 | GameType::CallOfDuty4 | GameType::CallOfDuty5 => {
                Some(Engine::Quake3)
            }
            GameType::Insurgency | GameType::Rust | GameType::Left4Dead2 => Some(Engine::Source),
            _ => None,
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for GameType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let game_type = match s.to_ascii_lowercase().as_str() {
            "unknown" => GameType::Unknown,
            "callofduty2" | "cod2" => GameType::CallOfDuty2,
            "callofduty4" | "cod4" => GameType::CallOfDuty4,
            "callofduty5" | "cod5" => GameType::CallOfDuty5,
            "insurgency" => GameType::Insurgency,
            "minecraft" => GameType::Minecraft,
            "arma" => GameType::Arma,
            "arma2" => GameType::Arma2,
            "arma3" => GameType::Arma3,
            "battlefield1" | "bf1" => GameType::Battlefield1,
            "rust" => GameType::Rust,
            "left4dead2" | "l4d2" => GameType::Left4Dead2,
            other => return Err(Error::Configuration(format!("unknown game type '{other}'"))),
        };
        Ok(game_type)
    }
}
