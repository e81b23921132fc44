use config::{Config, ConfigError, Environment, File, FileFormat};
use ilp_errors::RoutingError;
use ilp_ledger::{AccountId, AccountSettings, CreditLine};
use ilp_packet::Address;
use ilp_router::{PeerId, Route, RoutingRelation};
use serde::de::Error as DeserializeError;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

/// Environment variables with this prefix override file settings, for
/// example `ILP_CONNECTOR__PEER_RETRY=false`
pub const ENV_PREFIX: &str = "ILP_CONNECTOR";

fn default_expiry_sweep_interval() -> u64 {
    1000
}
fn default_peer_retry() -> bool {
    true
}
fn default_event_buffer() -> usize {
    1024
}

fn deserialize_relation<'de, D>(deserializer: D) -> Result<RoutingRelation, D::Error>
where
    D: Deserializer<'de>,
{
    let relation = String::deserialize(deserializer)?;
    RoutingRelation::from_str(&relation).map_err(|_| {
        DeserializeError::custom(format!(
            "Invalid relation {:?} (must be parent, peer or child)",
            relation
        ))
    })
}

/// Settings for the connector core
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ConnectorConfig {
    /// ILP address of this connector. Routes whose path contains it are
    /// never used.
    pub ilp_address: Address,
    /// Interval, in milliseconds, on which packets still waiting on a reply
    /// past their expiry are rolled back. Defaults to 1000ms.
    #[serde(default = "default_expiry_sweep_interval")]
    pub expiry_sweep_interval: u64,
    /// Retry once on an alternate route when the next hop is unreachable
    #[serde(default = "default_peer_retry")]
    pub peer_retry: bool,
    /// How many settlement events a slow subscriber may fall behind by
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    /// Routes installed at startup
    #[serde(default)]
    pub routes: Vec<StaticRoute>,
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AccountConfig {
    pub id: AccountId,
    pub asset_code: String,
    pub asset_scale: u8,
    /// How far below zero the balance may go. Unlimited if not set.
    #[serde(default)]
    pub credit_line: Option<u64>,
    #[serde(default)]
    pub parent_account_id: Option<AccountId>,
    /// Cover debits beyond the credit line from the parent-extended trustline
    #[serde(default)]
    pub rollup: bool,
}

impl AccountConfig {
    pub fn to_settings(&self) -> AccountSettings {
        AccountSettings {
            id: self.id,
            asset_code: self.asset_code.clone(),
            asset_scale: self.asset_scale,
            credit_line: match self.credit_line {
                Some(limit) => CreditLine::Limited(limit),
                None => CreditLine::Unlimited,
            },
            parent_account_id: self.parent_account_id,
            rollup: self.rollup,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StaticRoute {
    pub prefix: String,
    pub next_hop: String,
}

impl StaticRoute {
    pub fn to_route(&self) -> Result<Route, RoutingError> {
        let prefix = Address::from_str(&self.prefix).map_err(|err| RoutingError::InvalidPrefix {
            prefix: self.prefix.clone(),
            reason: err.to_string(),
        })?;
        Ok(Route::new(prefix, PeerId::new(self.next_hop.clone())))
    }
}

/// A peer whose connection is supplied at runtime
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PeerConfig {
    pub id: String,
    #[serde(deserialize_with = "deserialize_relation")]
    pub relation: RoutingRelation,
    #[serde(default)]
    pub is_route_broadcaster: bool,
    #[serde(default)]
    pub is_route_receiver: bool,
    pub account_id: AccountId,
}

impl ConnectorConfig {
    /// Load from a TOML, JSON or YAML file, chosen by its extension
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(File::with_name(path))
    }

    pub fn from_str(text: &str, format: FileFormat) -> Result<Self, ConfigError> {
        Self::load(File::from_str(text, format))
    }

    fn load<S>(source: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        Config::builder()
            .add_source(source)
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn peer(&self, id: &str) -> Option<&PeerConfig> {
        self.peers.iter().find(|peer| peer.id == id)
    }
}
