//! Wire types shared by the HTTP client and the simulator.
use crate::{Address, Error, GameId, Phase, Role, NAMESPACE};
use commonware_codec::{DecodeExt, Encode};
use commonware_cryptography::{
    ed25519::{PrivateKey, PublicKey, Signature},
    sha256::Sha256,
    Hasher, Signer, Verifier,
};
use commonware_utils::{from_hex, hex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transaction format version. The ledger accepts several incompatible
/// versions at once, so clients always name one explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransactionVersion {
    #[serde(rename = "0x1")]
    V1,
    #[serde(rename = "0x2")]
    V2,
    #[serde(rename = "0x3")]
    V3,
}

impl TransactionVersion {
    pub const LATEST: TransactionVersion = TransactionVersion::V3;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOptions {
    pub version: TransactionVersion,
}

impl TransactionOptions {
    pub fn latest() -> Self {
        Self {
            version: TransactionVersion::LATEST,
        }
    }
}

/// A contract call as submitted by one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub sender: Address,
    pub contract: Address,
    pub entrypoint: String,
    pub calldata: Value,
    pub nonce: u64,
    pub version: TransactionVersion,
}

impl Invocation {
    fn payload(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Hash identifying the transaction carrying this invocation.
    pub fn hash(&self) -> String {
        let digest = Sha256::hash(&self.payload());
        format!("0x{}", hex(&digest.0))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedInvocation {
    pub invocation: Invocation,
    pub public_key: String,
    pub signature: String,
}

impl SignedInvocation {
    pub fn sign(private: &PrivateKey, invocation: Invocation) -> Self {
        let signature = private.sign(NAMESPACE, &invocation.payload());
        Self {
            public_key: hex(&private.public_key().encode()),
            signature: hex(&signature.encode()),
            invocation,
        }
    }

    pub fn public_key(&self) -> Result<PublicKey, Error> {
        let bytes = from_hex(&self.public_key).ok_or(Error::InvalidHex("public key"))?;
        PublicKey::decode(bytes.as_slice()).map_err(|_| Error::InvalidEncoding("public key"))
    }

    pub fn verify(&self) -> Result<bool, Error> {
        let public = self.public_key()?;
        let bytes = from_hex(&self.signature).ok_or(Error::InvalidHex("signature"))?;
        let signature =
            Signature::decode(bytes.as_slice()).map_err(|_| Error::InvalidEncoding("signature"))?;
        Ok(public.verify(NAMESPACE, &self.invocation.payload(), &signature))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub transaction_hash: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Accepted,
    Reverted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_hash: String,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub contract: Address,
    pub entrypoint: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub address: Address,
    pub role: Role,
    pub alive: bool,
}

/// State returned by the `get_game` view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameView {
    pub game_id: GameId,
    pub phase: Phase,
    pub round: u64,
    pub voting_open: bool,
    pub players: Vec<PlayerView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_cryptography::Signer;
    use serde_json::json;

    fn invocation() -> Invocation {
        Invocation {
            sender: Address::from("0xa"),
            contract: Address::from("0xc0ffee"),
            entrypoint: "vote".to_string(),
            calldata: json!({ "game_id": 1, "target": "0xb" }),
            nonce: 4,
            version: TransactionVersion::LATEST,
        }
    }

    #[test]
    fn signed_invocation_verifies() {
        let private = PrivateKey::from_seed(1);
        let signed = SignedInvocation::sign(&private, invocation());
        assert!(signed.verify().unwrap());
        assert_eq!(signed.public_key().unwrap(), private.public_key());
    }

    #[test]
    fn tampered_invocation_fails_verification() {
        let private = PrivateKey::from_seed(1);
        let mut signed = SignedInvocation::sign(&private, invocation());
        signed.invocation.nonce += 1;
        assert!(!signed.verify().unwrap());

        signed.signature = "zz".to_string();
        assert!(matches!(signed.verify(), Err(Error::InvalidHex(_))));
    }

    #[test]
    fn version_is_serialized_explicitly() {
        let value = serde_json::to_value(TransactionOptions::latest()).unwrap();
        assert_eq!(value, json!({ "version": "0x3" }));
    }

    #[test]
    fn hash_depends_on_nonce() {
        let a = invocation();
        let mut b = invocation();
        b.nonce += 1;
        assert_ne!(a.hash(), b.hash());
        assert!(a.hash().starts_with("0x"));
    }
}
