//! HTTP [Ledger] backed by a werewolf simulator node.
use crate::{AccountIdentity, Call, Error, Ledger, LedgerError, Result, TransactionHandle};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;
use url::Url;
use werewolf_types::{
    api::{
        CallRequest, ErrorResponse, Invocation, NonceResponse, Receipt, SignedInvocation,
        SubmitResponse, TransactionOptions, TransactionStatus,
    },
    Address,
};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct Client {
    pub(crate) base_url: Url,
    http: reqwest::Client,
    poll_interval: Duration,
    confirmation_timeout: Duration,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidScheme(scheme.to_string())),
        }
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url,
            http,
            poll_interval: DEFAULT_POLL_INTERVAL,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_confirmation_timeout(mut self, confirmation_timeout: Duration) -> Self {
        self.confirmation_timeout = confirmation_timeout;
        self
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, LedgerError> {
        self.base_url
            .join(path)
            .map_err(|err| LedgerError::new(format!("invalid endpoint {path}: {err}")))
    }

    pub async fn nonce(&self, address: &Address) -> std::result::Result<u64, LedgerError> {
        let url = self.endpoint(&format!("nonce/{address}"))?;
        let response = self.http.get(url).send().await.map_err(transport_error)?;
        let NonceResponse { nonce } = read_json(response).await?;
        Ok(nonce)
    }

    pub async fn receipt(
        &self,
        handle: &TransactionHandle,
    ) -> std::result::Result<Receipt, LedgerError> {
        let url = self.endpoint(&format!("tx/{handle}"))?;
        let response = self.http.get(url).send().await.map_err(transport_error)?;
        read_json(response).await
    }
}

#[async_trait]
impl Ledger for Client {
    async fn submit(
        &self,
        contract: &Address,
        call: &Call,
        signer: &AccountIdentity,
        options: &TransactionOptions,
    ) -> std::result::Result<TransactionHandle, LedgerError> {
        let nonce = self.nonce(signer.address()).await?;
        let invocation = Invocation {
            sender: signer.address().clone(),
            contract: contract.clone(),
            entrypoint: call.entrypoint.clone(),
            calldata: call.calldata.clone(),
            nonce,
            version: options.version,
        };
        let signed = SignedInvocation::sign(signer.signing_key(), invocation);
        let response = self
            .http
            .post(self.endpoint("submit")?)
            .json(&signed)
            .send()
            .await
            .map_err(transport_error)?;
        let SubmitResponse { transaction_hash } = read_json(response).await?;
        debug!(
            sender = %signer.address(),
            entrypoint = %call.entrypoint,
            nonce,
            %transaction_hash,
            "submitted transaction"
        );
        Ok(TransactionHandle::new(transaction_hash))
    }

    async fn await_confirmation(
        &self,
        handle: &TransactionHandle,
    ) -> std::result::Result<(), LedgerError> {
        let deadline = Instant::now() + self.confirmation_timeout;
        loop {
            let receipt = self.receipt(handle).await?;
            match receipt.status {
                TransactionStatus::Accepted => return Ok(()),
                TransactionStatus::Reverted => {
                    let reason = receipt.revert_reason.unwrap_or_default();
                    return Err(LedgerError::new(format!(
                        "Transaction reverted: {reason}"
                    )));
                }
                TransactionStatus::Pending => {}
            }
            if Instant::now() >= deadline {
                return Err(LedgerError::new(format!(
                    "confirmation timed out for {handle}"
                )));
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn query_state(
        &self,
        contract: &Address,
        view: &str,
        args: &[Value],
    ) -> std::result::Result<Value, LedgerError> {
        let request = CallRequest {
            contract: contract.clone(),
            entrypoint: view.to_string(),
            args: args.to_vec(),
        };
        let response = self
            .http
            .post(self.endpoint("call")?)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }
}

fn transport_error(err: reqwest::Error) -> LedgerError {
    let message = if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("node unavailable: {err}")
    } else {
        err.to_string()
    };
    LedgerError {
        message,
        status: err.status().map(|status| status.as_u16()),
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> std::result::Result<T, LedgerError> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(transport_error);
    }
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(ErrorResponse { error }) => error,
        Err(_) if status == StatusCode::SERVICE_UNAVAILABLE => format!("node unavailable: {body}"),
        Err(_) => format!("{status}: {body}"),
    };
    Err(LedgerError::with_status(message, status.as_u16()))
}
