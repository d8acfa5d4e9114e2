use natural_order::natural_sort_by_key;
use serde::{Deserialize, Serialize};

pub mod auth;
pub mod config;
pub mod format;

pub const MINER_FROZEN_STATUS: &str = "Frozen";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct HostInfo {
    pub host: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub miner_info_list: Vec<MinerInfo>,
}

impl HostInfo {
    pub fn sort_miners(&mut self) {
        natural_sort_by_key(&mut self.miner_info_list, |miner| {
            miner.signature_acc.as_str()
        });
    }

    pub fn find_miner(&self, signature_acc: &str) -> Option<&MinerInfo> {
        self.miner_info_list
            .iter()
            .find(|miner| miner.signature_acc == signature_acc)
    }
}

pub fn sort_hosts(hosts: &mut [HostInfo]) {
    natural_sort_by_key(hosts, |host| host.host.as_str());
    for host in hosts.iter_mut() {
        host.sort_miners();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MinerInfo {
    #[serde(rename = "SignatureAcc")]
    pub signature_acc: String,
    #[serde(rename = "Conf", default)]
    pub conf: MinerConf,
    #[serde(rename = "CInfo", default)]
    pub container: ContainerInfo,
    #[serde(rename = "MinerStat", default)]
    pub stat: MinerStat,
}

impl MinerInfo {
    pub fn is_punished(&self) -> bool {
        !self.stat.punishments.is_empty()
    }

    pub fn is_frozen(&self) -> bool {
        self.stat.status == MINER_FROZEN_STATUS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct MinerConf {
    pub app: AppConf,
    pub chain: ChainConf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppConf {
    pub workspace: String,
    pub port: u32,
    pub max_use_space: u64,
    pub cores: u32,
    #[serde(rename = "APIEndpoint")]
    pub api_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct ChainConf {
    pub mnemonic: String,
    pub staking_acc: String,
    pub earnings_acc: String,
    #[serde(rename = "RPCs", deserialize_with = "de::null_as_default")]
    pub rpcs: Vec<String>,
    #[serde(rename = "TEEs", deserialize_with = "de::null_as_default")]
    pub tees: Vec<String>,
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ContainerInfo {
    pub id: String,
    #[serde(deserialize_with = "de::null_as_default")]
    pub names: Vec<String>,
    pub name: String,
    pub image: String,
    pub image_id: String,
    pub command: String,
    pub created: i64,
    pub state: String,
    pub status: String,
    pub cpu_percent: String,
    pub memory_percent: String,
    pub mem_usage: String,
}

// Stat amounts arrive either preformatted or as raw JSON numbers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MinerStat {
    pub peer_id: String,
    #[serde(deserialize_with = "de::display_string")]
    pub collaterals: String,
    #[serde(deserialize_with = "de::display_string")]
    pub debt: String,
    pub status: String,
    #[serde(deserialize_with = "de::display_string")]
    pub declaration_space: String,
    #[serde(deserialize_with = "de::display_string")]
    pub idle_space: String,
    #[serde(deserialize_with = "de::display_string")]
    pub service_space: String,
    #[serde(deserialize_with = "de::display_string")]
    pub lock_space: String,
    #[serde(rename = "is_punished", deserialize_with = "de::one_or_many")]
    pub punishments: Vec<Punishment>,
    #[serde(deserialize_with = "de::display_string")]
    pub total_reward: String,
    #[serde(deserialize_with = "de::display_string")]
    pub reward_issued: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Punishment {
    pub block_id: u64,
    pub extrinsic_hash: String,
    pub extrinsic_name: String,
    pub block_hash: String,
    pub account: String,
    pub recv_account: String,
    #[serde(deserialize_with = "de::display_string")]
    pub amount: String,
    #[serde(rename = "type")]
    pub kind: i64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

pub(crate) mod de {
    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    pub fn display_string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => String::new(),
            Value::String(text) => text,
            other => other.to_string(),
        })
    }

    pub fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items
                .into_iter()
                .map(|item| serde_json::from_value(item).map_err(D::Error::custom))
                .collect(),
            single => serde_json::from_value(single)
                .map(|item| vec![item])
                .map_err(D::Error::custom),
        }
    }
}
