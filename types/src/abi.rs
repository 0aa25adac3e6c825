//! Contract interface description.
//!
//! The description is a JSON array of entries. Functions may appear at the top
//! level or nested in an `interface` entry's `items`:
//!
//! ```json
//! [
//!   { "type": "interface", "name": "IWerewolf", "items": [
//!     { "type": "function", "name": "vote", "state_mutability": "external",
//!       "inputs": [{ "name": "game_id", "type": "u64" }, { "name": "target", "type": "address" }] }
//!   ]}
//! ]
//! ```
use crate::{ActionKind, Error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// View entrypoint returning the state of one game.
pub const GET_GAME: &str = "get_game";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutability {
    External,
    View,
}

impl Mutability {
    fn as_str(&self) -> &'static str {
        match self {
            Mutability::External => "external",
            Mutability::View => "view",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<Input>,
    pub state_mutability: Mutability,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Entry {
    Function(Function),
    Interface {
        #[serde(default)]
        items: Vec<Entry>,
    },
    #[serde(other)]
    Other,
}

/// Parsed contract interface description.
#[derive(Clone, Debug, Default)]
pub struct ContractAbi {
    functions: BTreeMap<String, Function>,
}

impl ContractAbi {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let entries: Vec<Entry> = serde_json::from_str(json)?;
        let mut functions = BTreeMap::new();
        collect(entries, &mut functions);
        Ok(Self { functions })
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    /// Description of the werewolf contract with its default entrypoint names.
    pub fn werewolf() -> Self {
        let address = |name: &str| Input {
            name: name.to_string(),
            ty: "address".to_string(),
        };
        let game_id = Input {
            name: "game_id".to_string(),
            ty: "u64".to_string(),
        };
        let mut functions = BTreeMap::new();
        for kind in ActionKind::ALL {
            let mut inputs = vec![game_id.clone()];
            match kind {
                ActionKind::StartGame => inputs.push(Input {
                    name: "players".to_string(),
                    ty: "array<address>".to_string(),
                }),
                ActionKind::Vote | ActionKind::NightAction | ActionKind::HunterAction => {
                    inputs.push(address("target"))
                }
                ActionKind::CupidAction => {
                    inputs.push(address("lover1"));
                    inputs.push(address("lover2"));
                }
                ActionKind::WitchAction => {
                    inputs.push(address("target"));
                    for flag in ["save", "poison"] {
                        inputs.push(Input {
                            name: flag.to_string(),
                            ty: "bool".to_string(),
                        });
                    }
                }
                ActionKind::PassNight | ActionKind::PassDay | ActionKind::EndVoting => {}
            }
            functions.insert(
                kind.entrypoint().to_string(),
                Function {
                    name: kind.entrypoint().to_string(),
                    inputs,
                    state_mutability: Mutability::External,
                },
            );
        }
        functions.insert(
            GET_GAME.to_string(),
            Function {
                name: GET_GAME.to_string(),
                inputs: vec![game_id],
                state_mutability: Mutability::View,
            },
        );
        Self { functions }
    }

    fn require(&self, name: &str, expected: Mutability) -> Result<String, Error> {
        let function = self
            .function(name)
            .ok_or_else(|| Error::MissingEntrypoint(name.to_string()))?;
        if function.state_mutability != expected {
            return Err(Error::WrongMutability {
                name: name.to_string(),
                expected: expected.as_str(),
                found: function.state_mutability.as_str().to_string(),
            });
        }
        Ok(function.name.clone())
    }
}

fn collect(entries: Vec<Entry>, functions: &mut BTreeMap<String, Function>) {
    for entry in entries {
        match entry {
            Entry::Function(function) => {
                functions.insert(function.name.clone(), function);
            }
            Entry::Interface { items } => collect(items, functions),
            Entry::Other => {}
        }
    }
}

/// Entrypoint names the orchestrator submits to, resolved once from a
/// [ContractAbi].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entrypoints {
    actions: BTreeMap<ActionKind, String>,
    get_game: String,
}

impl Entrypoints {
    pub fn from_abi(abi: &ContractAbi) -> Result<Self, Error> {
        let mut actions = BTreeMap::new();
        for kind in ActionKind::ALL {
            actions.insert(kind, abi.require(kind.entrypoint(), Mutability::External)?);
        }
        let get_game = abi.require(GET_GAME, Mutability::View)?;
        Ok(Self { actions, get_game })
    }

    pub fn action(&self, kind: ActionKind) -> &str {
        self.actions
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.entrypoint())
    }

    pub fn get_game(&self) -> &str {
        &self.get_game
    }
}
