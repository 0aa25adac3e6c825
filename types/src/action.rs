use crate::{Address, Error, GameId, Phase};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

const TAG: &str = "entrypoint";
const GAME_ID: &str = "game_id";

/// A logical game action. Constructed, submitted and discarded; the acting
/// address travels with the signed invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entrypoint", rename_all = "snake_case")]
pub enum Action {
    StartGame { players: Vec<Address> },
    Vote { target: Address },
    NightAction { target: Address },
    CupidAction { lover1: Address, lover2: Address },
    WitchAction { target: Address, save: bool, poison: bool },
    HunterAction { target: Address },
    PassNight,
    PassDay,
    EndVoting,
}

/// Discriminant of [Action], one per contract entrypoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    StartGame,
    Vote,
    NightAction,
    CupidAction,
    WitchAction,
    HunterAction,
    PassNight,
    PassDay,
    EndVoting,
}

impl ActionKind {
    pub const ALL: [ActionKind; 9] = [
        ActionKind::StartGame,
        ActionKind::Vote,
        ActionKind::NightAction,
        ActionKind::CupidAction,
        ActionKind::WitchAction,
        ActionKind::HunterAction,
        ActionKind::PassNight,
        ActionKind::PassDay,
        ActionKind::EndVoting,
    ];

    /// Default contract entrypoint name.
    pub fn entrypoint(&self) -> &'static str {
        match self {
            ActionKind::StartGame => "start_game",
            ActionKind::Vote => "vote",
            ActionKind::NightAction => "night_action",
            ActionKind::CupidAction => "cupid_action",
            ActionKind::WitchAction => "witch_action",
            ActionKind::HunterAction => "hunter_action",
            ActionKind::PassNight => "pass_night",
            ActionKind::PassDay => "pass_day",
            ActionKind::EndVoting => "end_voting",
        }
    }

    pub fn from_entrypoint(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.entrypoint() == name)
    }

    pub fn is_phase_transition(&self) -> bool {
        matches!(
            self,
            ActionKind::PassNight | ActionKind::PassDay | ActionKind::EndVoting
        )
    }

    /// Phase reached once an action of this kind is confirmed while the game is
    /// in `current`. `None` when the action leaves the phase untouched.
    pub fn next_phase(&self, current: Phase) -> Option<Phase> {
        match self {
            ActionKind::StartGame => Some(Phase::Night),
            ActionKind::PassNight => Some(Phase::Day),
            ActionKind::PassDay => Some(Phase::Night),
            // Closes the voting sub-phase; the main phase stays Day.
            ActionKind::EndVoting => match current {
                Phase::Voting => Some(Phase::Day),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entrypoint())
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::StartGame { .. } => ActionKind::StartGame,
            Action::Vote { .. } => ActionKind::Vote,
            Action::NightAction { .. } => ActionKind::NightAction,
            Action::CupidAction { .. } => ActionKind::CupidAction,
            Action::WitchAction { .. } => ActionKind::WitchAction,
            Action::HunterAction { .. } => ActionKind::HunterAction,
            Action::PassNight => ActionKind::PassNight,
            Action::PassDay => ActionKind::PassDay,
            Action::EndVoting => ActionKind::EndVoting,
        }
    }

    /// Calldata object for this action against `game_id`.
    pub fn calldata(&self, game_id: GameId) -> Value {
        let mut fields = match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        };
        fields.remove(TAG);
        fields.insert(GAME_ID.to_string(), Value::from(game_id));
        Value::Object(fields)
    }

    /// Inverse of [Action::calldata] for the entrypoint `kind`.
    pub fn from_calldata(kind: ActionKind, calldata: &Value) -> Result<(GameId, Self), Error> {
        let Value::Object(fields) = calldata else {
            return Err(Error::InvalidEncoding("calldata"));
        };
        let game_id = fields
            .get(GAME_ID)
            .and_then(Value::as_u64)
            .ok_or(Error::InvalidEncoding("game_id"))?;
        let mut fields = fields.clone();
        fields.remove(GAME_ID);
        fields.insert(TAG.to_string(), Value::from(kind.entrypoint()));
        let action = serde_json::from_value(Value::Object(fields))
            .map_err(|_| Error::InvalidEncoding("calldata"))?;
        Ok((game_id, action))
    }
}
