use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use werewolf_types::{
    abi::GET_GAME,
    api::{CallRequest, Receipt, SignedInvocation, TransactionStatus, TransactionVersion},
    Action, ActionKind, Address, GameId,
};

mod api;
pub use api::Api;

mod contract;
pub use contract::{Contract, Revert};

#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    /// Address the werewolf contract is deployed at.
    pub contract: Address,
    /// Delay between acceptance of a transaction and its receipt turning
    /// `accepted`.
    pub finality: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            contract: Address::from("0x5ea1ed"),
            finality: Duration::from_millis(500),
        }
    }
}

/// Why a submission or view call was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Unsupported transaction version")]
    UnsupportedVersion,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid transaction nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },
    #[error("Contract not found: {0}")]
    UnknownContract(Address),
    #[error("Entrypoint not found: {0}")]
    UnknownEntrypoint(String),
    #[error("Invalid calldata: {0}")]
    InvalidCalldata(String),
    #[error("Transaction execution error: {0}")]
    Execution(Revert),
    #[error("Call error: {0}")]
    View(Revert),
}

#[derive(Default)]
struct State {
    contract: Contract,
    nonces: HashMap<Address, u64>,
    /// Public key (hex) bound to each sender on first use.
    keys: HashMap<Address, String>,
    accepted: HashMap<String, Instant>,
}

pub struct Simulator {
    config: SimulatorConfig,
    state: RwLock<State>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            state: RwLock::new(State::default()),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Next nonce expected from `address`.
    pub async fn nonce(&self, address: &Address) -> u64 {
        let state = self.state.read().await;
        state.nonces.get(address).copied().unwrap_or(0)
    }

    /// Validate and execute `signed`, returning its transaction hash. Nothing
    /// is recorded for a refused submission.
    pub async fn submit(&self, signed: SignedInvocation) -> Result<String, SubmitError> {
        let invocation = &signed.invocation;
        if invocation.version != TransactionVersion::LATEST {
            return Err(SubmitError::UnsupportedVersion);
        }
        if !matches!(signed.verify(), Ok(true)) {
            return Err(SubmitError::InvalidSignature);
        }
        if invocation.contract != self.config.contract {
            return Err(SubmitError::UnknownContract(invocation.contract.clone()));
        }
        let kind = ActionKind::from_entrypoint(&invocation.entrypoint)
            .ok_or_else(|| SubmitError::UnknownEntrypoint(invocation.entrypoint.clone()))?;
        let (game_id, action) = Action::from_calldata(kind, &invocation.calldata)
            .map_err(|err| SubmitError::InvalidCalldata(err.to_string()))?;

        let mut state = self.state.write().await;
        match state.keys.get(&invocation.sender) {
            Some(bound) if bound != &signed.public_key => {
                return Err(SubmitError::InvalidSignature)
            }
            _ => {}
        }
        let expected = state.nonces.get(&invocation.sender).copied().unwrap_or(0);
        if invocation.nonce != expected {
            return Err(SubmitError::InvalidNonce {
                expected,
                got: invocation.nonce,
            });
        }
        state
            .contract
            .execute(&invocation.sender, game_id, action)
            .map_err(|revert| {
                debug!(sender = %invocation.sender, game_id, action = %kind, %revert, "reverted");
                SubmitError::Execution(revert)
            })?;

        state
            .keys
            .entry(invocation.sender.clone())
            .or_insert_with(|| signed.public_key.clone());
        state.nonces.insert(invocation.sender.clone(), expected + 1);
        let hash = invocation.hash();
        state.accepted.insert(hash.clone(), Instant::now());
        info!(sender = %invocation.sender, game_id, action = %kind, %hash, "transaction accepted");
        Ok(hash)
    }

    /// Receipt for `hash`, or `None` when no such transaction was accepted.
    pub async fn receipt(&self, hash: &str) -> Option<Receipt> {
        let state = self.state.read().await;
        let accepted_at = state.accepted.get(hash)?;
        let status = if accepted_at.elapsed() >= self.config.finality {
            TransactionStatus::Accepted
        } else {
            TransactionStatus::Pending
        };
        Some(Receipt {
            transaction_hash: hash.to_string(),
            status,
            revert_reason: None,
        })
    }

    /// Evaluate a view entrypoint.
    pub async fn call(&self, request: &CallRequest) -> Result<Value, SubmitError> {
        if request.contract != self.config.contract {
            return Err(SubmitError::UnknownContract(request.contract.clone()));
        }
        if request.entrypoint != GET_GAME {
            return Err(SubmitError::UnknownEntrypoint(request.entrypoint.clone()));
        }
        let game_id: GameId = request
            .args
            .first()
            .and_then(Value::as_u64)
            .ok_or_else(|| SubmitError::InvalidCalldata("expected a game id".to_string()))?;
        let state = self.state.read().await;
        let view = state
            .contract
            .get_game(game_id)
            .map_err(SubmitError::View)?;
        serde_json::to_value(view).map_err(|err| SubmitError::InvalidCalldata(err.to_string()))
    }
}
