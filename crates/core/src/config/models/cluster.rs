use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::placement::PlacementConfig;

/// 一个后端集群/实例的配置，构造一个执行器
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    pub kind: String,
    /// 控制面地址，例如 `http://metronome.marathon.l4lb.thisdcos.directory:9000`
    pub address: String,
    /// 后端特有的选项（Flink 的 jar id、Spark master 等）
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// 集群级环境信息（`DICE_STORAGE_MOUNTPOINT` 等），注入容器并用于渲染挂载路径
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// 为空时由执行器工厂填入全局的 `placement` 配置
    #[serde(default)]
    pub placement: PlacementConfig,
    /// 集群内网入口；设置后发往该集群的请求改走这个地址
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

impl ClusterConfig {
    pub fn new<N: Into<String>, K: Into<String>, A: Into<String>>(name: N, kind: K, address: A) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            address: address.into(),
            options: BTreeMap::new(),
            env: BTreeMap::new(),
            placement: PlacementConfig::default(),
            route: None,
        }
    }

    pub fn with_option<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_route<A: Into<String>>(mut self, address: A) -> Self {
        self.route = Some(address.into());
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            return Err(anyhow::anyhow!("集群名不能为空"));
        }
        if self.kind.trim().is_empty() {
            return Err(anyhow::anyhow!("集群类型不能为空: {}", self.name));
        }
        if self.address.trim().is_empty() {
            return Err(anyhow::anyhow!("集群地址不能为空: {}", self.name));
        }
        if self.route.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(anyhow::anyhow!("集群内网入口不能为空字符串: {}", self.name));
        }
        Ok(())
    }
}
