//! Scripted in-memory [Ledger] for tests.
use crate::{AccountIdentity, Call, Ledger, LedgerError, TransactionHandle};
use async_trait::async_trait;
use serde_json::Value;
use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};
use werewolf_types::{
    api::{TransactionOptions, TransactionVersion},
    Address, GameId,
};

/// A submission recorded by [MockLedger].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submitted {
    pub sender: Address,
    pub call: Call,
    pub version: TransactionVersion,
}

#[derive(Default)]
struct Inner {
    scripted: HashMap<String, VecDeque<LedgerError>>,
    persistent: HashMap<String, LedgerError>,
    by_sender: HashMap<(String, Address), LedgerError>,
    confirmation_failures: VecDeque<LedgerError>,
    states: HashMap<GameId, Value>,
    submitted: Vec<Submitted>,
    attempts: HashMap<String, usize>,
    confirmations: usize,
    queries: usize,
}

/// Accepts every submission unless a failure was scripted for its entrypoint.
/// Failed attempts are counted but not recorded as submitted.
#[derive(Default)]
pub struct MockLedger {
    inner: Mutex<Inner>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next submission to `entrypoint` with `message`. Queued
    /// failures are consumed in order.
    pub fn fail_next(&self, entrypoint: &str, message: &str) {
        self.inner()
            .scripted
            .entry(entrypoint.to_string())
            .or_default()
            .push_back(LedgerError::new(message));
    }

    /// Fail every submission to `entrypoint` with `message`.
    pub fn fail_always(&self, entrypoint: &str, message: &str) {
        self.inner()
            .persistent
            .insert(entrypoint.to_string(), LedgerError::new(message));
    }

    /// Fail every submission to `entrypoint` signed by `sender`.
    pub fn fail_from(&self, sender: &Address, entrypoint: &str, message: &str) {
        self.inner().by_sender.insert(
            (entrypoint.to_string(), sender.clone()),
            LedgerError::new(message),
        );
    }

    pub fn fail_next_confirmation(&self, message: &str) {
        self.inner()
            .confirmation_failures
            .push_back(LedgerError::new(message));
    }

    /// Make `get_game` return `state` for `game_id`.
    pub fn set_state(&self, game_id: GameId, state: Value) {
        self.inner().states.insert(game_id, state);
    }

    /// Submission attempts to `entrypoint`, failed ones included.
    pub fn attempts(&self, entrypoint: &str) -> usize {
        self.inner().attempts.get(entrypoint).copied().unwrap_or(0)
    }

    pub fn submitted(&self) -> Vec<Submitted> {
        self.inner().submitted.clone()
    }

    pub fn confirmations(&self) -> usize {
        self.inner().confirmations
    }

    pub fn queries(&self) -> usize {
        self.inner().queries
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn submit(
        &self,
        _contract: &Address,
        call: &Call,
        signer: &AccountIdentity,
        options: &TransactionOptions,
    ) -> Result<TransactionHandle, LedgerError> {
        let mut inner = self.inner();
        *inner.attempts.entry(call.entrypoint.clone()).or_default() += 1;
        if options.version != TransactionVersion::LATEST {
            return Err(LedgerError::new("Unsupported transaction version"));
        }
        if let Some(err) = inner
            .scripted
            .get_mut(&call.entrypoint)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        if let Some(err) = inner.persistent.get(&call.entrypoint) {
            return Err(err.clone());
        }
        let key = (call.entrypoint.clone(), signer.address().clone());
        if let Some(err) = inner.by_sender.get(&key) {
            return Err(err.clone());
        }
        inner.submitted.push(Submitted {
            sender: signer.address().clone(),
            call: call.clone(),
            version: options.version,
        });
        Ok(TransactionHandle::new(format!("0x{:x}", inner.submitted.len())))
    }

    async fn await_confirmation(&self, _handle: &TransactionHandle) -> Result<(), LedgerError> {
        let mut inner = self.inner();
        if let Some(err) = inner.confirmation_failures.pop_front() {
            return Err(err);
        }
        inner.confirmations += 1;
        Ok(())
    }

    async fn query_state(
        &self,
        _contract: &Address,
        _view: &str,
        args: &[Value],
    ) -> Result<Value, LedgerError> {
        let mut inner = self.inner();
        inner.queries += 1;
        args.first()
            .and_then(Value::as_u64)
            .and_then(|game_id| inner.states.get(&game_id).cloned())
            .ok_or_else(|| LedgerError::new("Game not found"))
    }
}
