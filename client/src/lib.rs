pub mod accounts;
pub mod classifier;
pub mod client;
pub mod config;
pub mod ledger;
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
pub mod orchestrator;
pub mod retry;
pub mod scenario;

pub use accounts::{AccountIdentity, AccountRegistry};
pub use classifier::{Classification, ErrorClassifier, Rule, GAME_EXISTS, TARGET_PROTECTED};
pub use client::Client;
pub use config::{Config, RoleBook};
pub use ledger::{Call, Ledger, LedgerError, TransactionHandle};
pub use orchestrator::GameOrchestrator;
pub use retry::{Failure, Outcome, RetryExecutor, RetryPolicy, TransactionOutcome};

use thiserror::Error;
use werewolf_types::Address;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("account not found: {0}")]
    AccountNotFound(Address),
    #[error("no accounts available")]
    NoAccountsAvailable,
    #[error("invalid signing key: {0}")]
    InvalidSigningKey(&'static str),
    #[error("contract description: {0}")]
    Abi(#[from] werewolf_types::Error),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
    #[error("scenario aborted at {step}: {failure}")]
    Aborted { step: String, failure: Failure },
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
