//! Ledger collaborator consumed by the orchestrator.
use crate::AccountIdentity;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use werewolf_types::{api::TransactionOptions, Address};

/// Raw failure surfaced by a [Ledger]. Classification happens elsewhere and
/// only looks at `message` and `status`.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{message}")]
pub struct LedgerError {
    pub message: String,
    pub status: Option<u16>,
}

impl LedgerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

/// Opaque handle returned on submission and used to await confirmation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransactionHandle(String);

impl TransactionHandle {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entrypoint and calldata of one contract call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub entrypoint: String,
    pub calldata: Value,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Sign `call` with `signer` and submit it to `contract`.
    async fn submit(
        &self,
        contract: &Address,
        call: &Call,
        signer: &AccountIdentity,
        options: &TransactionOptions,
    ) -> Result<TransactionHandle, LedgerError>;

    /// Wait until the transaction is final. Any deadline is the ledger's own.
    async fn await_confirmation(&self, handle: &TransactionHandle) -> Result<(), LedgerError>;

    /// Call a view entrypoint. Fails when the requested state does not exist.
    async fn query_state(
        &self,
        contract: &Address,
        view: &str,
        args: &[Value],
    ) -> Result<Value, LedgerError>;
}
