use crate::{
    accounts::decode_signing_key, AccountRegistry, Error, ErrorClassifier, Result, RetryPolicy,
    Rule,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path, path::PathBuf, time::Duration};
use werewolf_types::{Address, ContractAbi, Role};

const ENV_PREFIX: &str = "WEREWOLF";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            jitter: false,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
            .with_jitter(self.jitter)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub role: Role,
    pub address: Address,
    pub private_key: String,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("role", &self.role)
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Settings for driving games against a ledger node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub base_url: String,
    pub contract_address: Address,
    /// Contract description JSON; the built-in werewolf description is used
    /// when unset.
    #[serde(default)]
    pub abi_path: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub retry: RetryConfig,
    /// Classification table replacing the default one.
    #[serde(default)]
    pub classifier: Option<Vec<Rule>>,

    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Pause between scenario steps.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,

    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_ms() -> u64 {
    2_000
}

fn default_confirmation_timeout_ms() -> u64 {
    60_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_step_delay_ms() -> u64 {
    1_000
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Apply `WEREWOLF_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed like the environment variables:
    /// `WEREWOLF_BASE_URL`, `WEREWOLF_CONTRACT_ADDRESS`, `WEREWOLF_ABI_PATH`
    /// and `WEREWOLF_<ROLE>_ADDRESS` / `WEREWOLF_<ROLE>_PRIVATE_KEY`.
    ///
    /// A role override edits the first account with that role, or adds one
    /// when both its address and key are given.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(base_url) = lookup(&format!("{ENV_PREFIX}_BASE_URL")) {
            self.base_url = base_url;
        }
        if let Some(contract) = lookup(&format!("{ENV_PREFIX}_CONTRACT_ADDRESS")) {
            self.contract_address = Address::new(contract);
        }
        if let Some(abi_path) = lookup(&format!("{ENV_PREFIX}_ABI_PATH")) {
            self.abi_path = Some(PathBuf::from(abi_path));
        }

        for role in Role::ALL {
            let name = role.as_str().to_uppercase();
            let address = lookup(&format!("{ENV_PREFIX}_{name}_ADDRESS")).map(Address::new);
            let private_key = lookup(&format!("{ENV_PREFIX}_{name}_PRIVATE_KEY"));
            if address.is_none() && private_key.is_none() {
                continue;
            }
            match self.accounts.iter_mut().find(|account| account.role == role) {
                Some(account) => {
                    if let Some(address) = address {
                        account.address = address;
                    }
                    if let Some(private_key) = private_key {
                        account.private_key = private_key;
                    }
                }
                None => match (address, private_key) {
                    (Some(address), Some(private_key)) => self.accounts.push(AccountConfig {
                        role,
                        address,
                        private_key,
                    }),
                    _ => {
                        return Err(Error::Config(format!(
                            "{ENV_PREFIX}_{name}_ADDRESS and {ENV_PREFIX}_{name}_PRIVATE_KEY must both be set"
                        )))
                    }
                },
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("base_url must not be empty".to_string()));
        }
        if self.contract_address.as_str().trim().is_empty() {
            return Err(Error::Config(
                "contract_address must not be empty".to_string(),
            ));
        }
        if self.accounts.is_empty() {
            return Err(Error::Config("at least one account is required".to_string()));
        }
        Ok(())
    }

    pub fn load_abi(&self) -> Result<ContractAbi> {
        match &self.abi_path {
            Some(path) => {
                let contents = fs::read_to_string(path)?;
                Ok(ContractAbi::from_json(&contents)?)
            }
            None => Ok(ContractAbi::werewolf()),
        }
    }

    pub fn classifier(&self) -> ErrorClassifier {
        match &self.classifier {
            Some(rules) => ErrorClassifier::new(rules.clone()),
            None => ErrorClassifier::default(),
        }
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    /// Decode every configured account.
    pub fn registry(&self) -> Result<(AccountRegistry, RoleBook)> {
        let mut registry = AccountRegistry::new();
        let mut book = RoleBook::default();
        for account in &self.accounts {
            let key = decode_signing_key(&account.private_key).map_err(|err| {
                Error::Config(format!("account {}: {err}", account.address))
            })?;
            registry.register(account.address.clone(), key);
            book.insert(account.role, account.address.clone());
        }
        Ok((registry, book))
    }
}

/// Addresses grouped by the role they are expected to be dealt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleBook {
    roles: BTreeMap<Role, Vec<Address>>,
}

impl RoleBook {
    pub fn insert(&mut self, role: Role, address: Address) {
        self.roles.entry(role).or_default().push(address);
    }

    pub fn first(&self, role: Role) -> Result<&Address> {
        self.roles
            .get(&role)
            .and_then(|addresses| addresses.first())
            .ok_or_else(|| Error::Config(format!("no account configured for role {role}")))
    }

    pub fn addresses(&self, role: Role) -> &[Address] {
        self.roles.get(&role).map(Vec::as_slice).unwrap_or_default()
    }

    /// Player list for `start_game`: the first address of every dealt role in
    /// deal order, then everyone else. Addresses get their role only when no
    /// earlier dealt role is missing.
    pub fn seating(&self) -> Vec<Address> {
        let mut seated = Vec::new();
        let mut rest = Vec::new();
        for role in Role::ALL {
            for (index, address) in self.addresses(role).iter().enumerate() {
                if index == 0 && role != Role::Villager {
                    seated.push(address.clone());
                } else {
                    rest.push(address.clone());
                }
            }
        }
        seated.extend(rest);
        seated
    }

    pub fn len(&self) -> usize {
        self.roles.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::signing_key_from_seed;
    use commonware_codec::Encode;
    use commonware_cryptography::Signer;
    use commonware_utils::hex;
    use std::collections::HashMap;

    fn key_hex(seed: u64) -> String {
        hex(&signing_key_from_seed(seed).encode())
    }

    fn sample() -> String {
        format!(
            r#"
base_url: "http://localhost:8080"
contract_address: "0xc0ffee"
retry:
  max_attempts: 3
  backoff_ms: 250
accounts:
  - role: werewolf
    address: "0x01"
    private_key: "{}"
  - role: seer
    address: "0x02"
    private_key: "0x{}"
"#,
            key_hex(1),
            key_hex(2)
        )
    }

    #[test]
    fn parses_with_defaults() {
        let config = Config::parse(&sample()).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.abi_path, None);
        assert_eq!(config.confirmation_timeout(), Duration::from_secs(60));
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(
            config.retry.policy(),
            RetryPolicy::new(3, Duration::from_millis(250))
        );
        assert_eq!(config.classifier(), ErrorClassifier::default());
        config.validate().unwrap();

        let retry: RetryConfig = serde_yaml::from_str("jitter: true").unwrap();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.backoff_ms, 2_000);
        assert!(retry.policy().jitter);
    }

    #[test]
    fn builds_registry_and_role_book() {
        let config = Config::parse(&sample()).unwrap();
        let (registry, book) = config.registry().unwrap();
        assert_eq!(registry.len(), 2);
        let seer = registry.resolve(&Address::from("0x02")).unwrap();
        assert_eq!(seer.public_key(), signing_key_from_seed(2).public_key());
        assert_eq!(book.first(Role::Werewolf).unwrap(), &Address::from("0x01"));
        assert!(matches!(book.first(Role::Witch), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_bad_private_key() {
        let mut config = Config::parse(&sample()).unwrap();
        config.accounts[0].private_key = "zz".to_string();
        let err = config.registry().unwrap_err();
        assert!(err.to_string().contains("0x01"), "{err}");
    }

    #[test]
    fn overrides_replace_and_add() {
        let mut config = Config::parse(&sample()).unwrap();
        let vars: HashMap<String, String> = [
            ("WEREWOLF_BASE_URL", "http://node:9000"),
            ("WEREWOLF_WEREWOLF_ADDRESS", "0x0a"),
            ("WEREWOLF_GUARD_ADDRESS", "0x03"),
            ("WEREWOLF_GUARD_PRIVATE_KEY", &key_hex(3)),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
        config
            .apply_overrides(|key| vars.get(key).cloned())
            .unwrap();

        assert_eq!(config.base_url, "http://node:9000");
        assert_eq!(config.contract_address, Address::from("0xc0ffee"));
        assert_eq!(config.accounts[0].address, Address::from("0x0a"));
        assert_eq!(config.accounts[0].private_key, key_hex(1));
        assert_eq!(config.accounts[2].role, Role::Guard);
        config.registry().unwrap();
    }

    #[test]
    fn partial_override_for_new_role_is_rejected() {
        let mut config = Config::parse(&sample()).unwrap();
        let err = config
            .apply_overrides(|key| (key == "WEREWOLF_CUPID_ADDRESS").then(|| "0x09".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn seating_follows_deal_order() {
        let mut book = RoleBook::default();
        book.insert(Role::Villager, Address::from("v1"));
        book.insert(Role::Seer, Address::from("s"));
        book.insert(Role::Werewolf, Address::from("w1"));
        book.insert(Role::Werewolf, Address::from("w2"));
        book.insert(Role::Witch, Address::from("x"));

        let seating = book.seating();
        let seats: Vec<&str> = seating.iter().map(Address::as_str).collect();
        assert_eq!(seats, ["w1", "x", "s", "w2", "v1"]);
        assert_eq!(book.len(), 5);
    }
}
