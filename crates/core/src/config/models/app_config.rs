use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{
    addon::AddonConfig, cluster::ClusterConfig, http::HttpConfig, placement::PlacementConfig,
};
use crate::logging::LogConfig;

/// 未指定配置文件时依次查找的位置
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/workload.toml",
    "workload.toml",
    "/etc/workload/config.toml",
];

pub const ENV_PREFIX: &str = "WORKLOAD";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log: LogConfig,
    pub http: HttpConfig,
    /// 每个条目对应一个执行器实例
    pub clusters: Vec<ClusterConfig>,
    /// 全局放置策略，集群未单独配置时继承
    pub placement: PlacementConfig,
    pub addons: AddonConfig,
}

impl AppConfig {
    /// 默认值 → TOML 文件 → `WORKLOAD_` 环境变量（嵌套字段用 `__` 连接）
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let file = match config_path {
            Some(path) if Path::new(path).exists() => Some(path),
            Some(path) => return Err(anyhow::anyhow!("配置文件不存在: {path}")),
            None => DEFAULT_CONFIG_PATHS.into_iter().find(|p| Path::new(p).exists()),
        };
        if let Some(path) = file {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        let config: AppConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn cluster(&self, name: &str) -> Option<&ClusterConfig> {
        self.clusters.iter().find(|c| c.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        self.http.validate().context("HTTP配置验证失败")?;

        let mut names = HashSet::new();
        for cluster in &self.clusters {
            cluster
                .validate()
                .with_context(|| format!("集群 {} 配置验证失败", cluster.name))?;
            if !names.insert(cluster.name.as_str()) {
                return Err(anyhow::anyhow!("集群名重复: {}", cluster.name));
            }
        }

        self.addons.validate().context("Addon配置验证失败")?;
        Ok(())
    }
}
