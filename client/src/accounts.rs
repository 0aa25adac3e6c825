use crate::{Error, Result};
use commonware_codec::{Encode, ReadExt};
use commonware_cryptography::{
    ed25519::{PrivateKey, PublicKey},
    Signer,
};
use commonware_utils::{from_hex, hex};
use std::{collections::HashMap, fmt};
use werewolf_types::Address;

/// Signing identity of one ledger account.
#[derive(Clone)]
pub struct AccountIdentity {
    address: Address,
    signing_key: PrivateKey,
}

impl AccountIdentity {
    pub fn new(address: Address, signing_key: PrivateKey) -> Self {
        Self {
            address,
            signing_key,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn signing_key(&self) -> &PrivateKey {
        &self.signing_key
    }

    pub fn public_key(&self) -> PublicKey {
        self.signing_key.public_key()
    }
}

impl fmt::Debug for AccountIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountIdentity")
            .field("address", &self.address)
            .field("public_key", &hex(&self.public_key().encode()))
            .finish_non_exhaustive()
    }
}

/// Identities keyed by address. Every address an orchestrator acts for must be
/// registered first.
#[derive(Default)]
pub struct AccountRegistry {
    accounts: HashMap<Address, AccountIdentity>,
    order: Vec<Address>,
}

impl fmt::Debug for AccountRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.order.iter().filter_map(|address| self.accounts.get(address)))
            .finish()
    }
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite the identity for `address`.
    pub fn register(&mut self, address: Address, signing_key: PrivateKey) {
        if !self.accounts.contains_key(&address) {
            self.order.push(address.clone());
        }
        self.accounts
            .insert(address.clone(), AccountIdentity::new(address, signing_key));
    }

    pub fn resolve(&self, address: &Address) -> Result<&AccountIdentity> {
        self.accounts
            .get(address)
            .ok_or_else(|| Error::AccountNotFound(address.clone()))
    }

    /// First-registered identity, for actions that are not role-specific.
    pub fn any(&self) -> Result<&AccountIdentity> {
        self.order
            .first()
            .and_then(|address| self.accounts.get(address))
            .ok_or(Error::NoAccountsAvailable)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Decode a hex-encoded ed25519 private key (optionally `0x` prefixed).
pub fn decode_signing_key(hex_str: &str) -> Result<PrivateKey> {
    let bytes = from_hex(hex_str.trim().trim_start_matches("0x"))
        .ok_or(Error::InvalidSigningKey("invalid hex"))?;
    let mut buf: &[u8] = bytes.as_slice();
    let key = PrivateKey::read(&mut buf).map_err(|_| Error::InvalidSigningKey("invalid key"))?;
    if !buf.is_empty() {
        return Err(Error::InvalidSigningKey("unexpected trailing bytes"));
    }
    Ok(key)
}

/// Deterministic key for tests and local simulations.
pub fn signing_key_from_seed(seed: u64) -> PrivateKey {
    PrivateKey::from_seed(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_returns_registered_identity() {
        let mut registry = AccountRegistry::new();
        let address = Address::from("0xa");
        registry.register(address.clone(), signing_key_from_seed(1));

        let identity = registry.resolve(&address).unwrap();
        assert_eq!(identity.address(), &address);
        assert_eq!(identity.public_key(), signing_key_from_seed(1).public_key());
    }

    #[test]
    fn resolve_unknown_address_fails() {
        let registry = AccountRegistry::new();
        let err = registry.resolve(&Address::from("0xdead")).unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(address) if address.as_str() == "0xdead"));
    }

    #[test]
    fn register_overwrites_identity() {
        let mut registry = AccountRegistry::new();
        let address = Address::from("0xa");
        registry.register(address.clone(), signing_key_from_seed(1));
        registry.register(address.clone(), signing_key_from_seed(2));

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.resolve(&address).unwrap().public_key(),
            signing_key_from_seed(2).public_key()
        );
    }

    #[test]
    fn any_is_first_registered() {
        let mut registry = AccountRegistry::new();
        assert!(matches!(registry.any(), Err(Error::NoAccountsAvailable)));

        registry.register(Address::from("0xb"), signing_key_from_seed(2));
        registry.register(Address::from("0xa"), signing_key_from_seed(1));
        registry.register(Address::from("0xb"), signing_key_from_seed(3));
        assert_eq!(registry.any().unwrap().address().as_str(), "0xb");
    }

    #[test]
    fn decodes_hex_signing_key() {
        let key = signing_key_from_seed(9);
        let encoded = format!("0x{}", hex(&key.encode()));
        let decoded = decode_signing_key(&encoded).unwrap();
        assert_eq!(decoded.public_key(), key.public_key());

        assert!(matches!(
            decode_signing_key("not-hex"),
            Err(Error::InvalidSigningKey("invalid hex"))
        ));
        let long = format!("{}00", hex(&key.encode()));
        assert!(decode_signing_key(&long).is_err());
    }

    #[test]
    fn debug_does_not_print_signing_key() {
        let key = signing_key_from_seed(4);
        let identity = AccountIdentity::new(Address::from("0xa"), key.clone());
        let debug = format!("{identity:?}");
        assert!(debug.contains("0xa"));
        assert!(!debug.contains(&hex(&key.encode())));
    }

    #[test]
    fn registry_debug_redacts_every_key() {
        let mut registry = AccountRegistry::new();
        let keys: Vec<_> = (0..3).map(signing_key_from_seed).collect();
        for (index, key) in keys.iter().enumerate() {
            registry.register(Address::new(format!("0x{index}")), key.clone());
        }
        let debug = format!("{registry:?}");
        assert!(debug.contains("0x0") && debug.contains("0x2"), "{debug}");
        for key in &keys {
            assert!(!debug.contains(&hex(&key.encode())));
        }
    }
}
