use crate::Error;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Handle of one game instance on the ledger. Supplied by the caller.
pub type GameId = u64;

/// Opaque account identifier on the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Werewolf,
    Witch,
    Guard,
    Seer,
    Hunter,
    Cupid,
    Villager,
}

impl Role {
    /// Order in which the contract deals roles to the `players` of `start_game`.
    /// Seats past the end of this list are villagers.
    pub const DEAL_ORDER: [Role; 6] = [
        Role::Werewolf,
        Role::Witch,
        Role::Guard,
        Role::Seer,
        Role::Hunter,
        Role::Cupid,
    ];

    pub const ALL: [Role; 7] = [
        Role::Werewolf,
        Role::Witch,
        Role::Guard,
        Role::Seer,
        Role::Hunter,
        Role::Cupid,
        Role::Villager,
    ];

    /// Role dealt to the player seated at `seat`.
    pub fn for_seat(seat: usize) -> Role {
        Self::DEAL_ORDER
            .get(seat)
            .copied()
            .unwrap_or(Role::Villager)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Werewolf => "werewolf",
            Role::Witch => "witch",
            Role::Guard => "guard",
            Role::Seer => "seer",
            Role::Hunter => "hunter",
            Role::Cupid => "cupid",
            Role::Villager => "villager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownRole(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Lobby,
    Night,
    Day,
    Voting,
    Ended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Lobby => "lobby",
            Phase::Night => "night",
            Phase::Day => "day",
            Phase::Voting => "voting",
            Phase::Ended => "ended",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deals_special_roles_then_villagers() {
        assert_eq!(Role::for_seat(0), Role::Werewolf);
        assert_eq!(Role::for_seat(2), Role::Guard);
        assert_eq!(Role::for_seat(5), Role::Cupid);
        assert_eq!(Role::for_seat(6), Role::Villager);
        assert_eq!(Role::for_seat(42), Role::Villager);
    }

    #[test]
    fn parses_roles_case_insensitively() {
        assert_eq!("Werewolf".parse::<Role>().unwrap(), Role::Werewolf);
        assert_eq!(" hunter ".parse::<Role>().unwrap(), Role::Hunter);
        assert!(matches!(
            "mayor".parse::<Role>(),
            Err(Error::UnknownRole(role)) if role == "mayor"
        ));
    }

    #[test]
    fn default_phase_is_lobby() {
        assert_eq!(Phase::default(), Phase::Lobby);
    }
}
