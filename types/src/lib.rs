//! Shared types for the werewolf game client, simulator and scenario driver.

pub mod abi;
pub mod action;
pub mod api;
pub mod game;

pub use abi::{ContractAbi, Entrypoints};
pub use action::{Action, ActionKind};
pub use game::{Address, GameId, Phase, Role};

use thiserror::Error;

/// Namespace used when signing invocations.
pub const NAMESPACE: &[u8] = b"_WEREWOLF_TX";

/// Error type for decoding shared types.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid contract description: {0}")]
    InvalidAbi(#[from] serde_json::Error),
    #[error("contract description is missing entrypoint `{0}`")]
    MissingEntrypoint(String),
    #[error("entrypoint `{name}` has mutability `{found}` (expected {expected})")]
    WrongMutability {
        name: String,
        expected: &'static str,
        found: String,
    },
    #[error("invalid hex: {0}")]
    InvalidHex(&'static str),
    #[error("invalid {0} encoding")]
    InvalidEncoding(&'static str),
    #[error("unknown role: {0}")]
    UnknownRole(String),
}
