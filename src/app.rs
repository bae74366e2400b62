use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{info, warn};

use workload_addons::mysql::{resolve, ClusterSpec};
use workload_addons::{AddonKind, AddonManager};
use workload_core::{AppConfig, ExecutorRegistry, HttpClient};
use workload_dispatcher::{compile_dcos, compile_k8s};
use workload_infrastructure::ReqwestHttpClient;
use workload_worker::ExecutorFactory;

/// 命令行各子命令的实现，输出统一是 JSON
pub struct Application<'r> {
    config: AppConfig,
    registry: &'r ExecutorRegistry,
    http: Arc<dyn HttpClient>,
}

impl<'r> Application<'r> {
    pub fn new(config: AppConfig, registry: &'r ExecutorRegistry) -> Result<Self> {
        config.validate().context("配置校验失败")?;
        let http = ReqwestHttpClient::new(&config.http)
            .context("创建HTTP客户端失败")?
            .with_cluster_routes(&config.clusters);
        Ok(Self {
            config,
            registry,
            http: Arc::new(http),
        })
    }

    pub fn kinds(&self) -> Value {
        let kinds: Vec<String> = self.registry.kinds().iter().map(|k| k.to_string()).collect();
        json!(kinds)
    }

    pub fn constraints(&self, labels_path: &Path, k8s: bool) -> Result<Value> {
        let labels: BTreeMap<String, String> = read_json(labels_path)?;
        let output = if k8s {
            serde_json::to_value(compile_k8s(&labels, &self.config.placement))?
        } else {
            serde_json::to_value(compile_dcos(&labels, &self.config.placement))?
        };
        Ok(output)
    }

    pub fn mysql_resolve(&self, spec_path: &Path) -> Result<Value> {
        let spec: ClusterSpec = read_json(spec_path)?;
        let solos = resolve(&spec).with_context(|| format!("MySQL 拓扑校验失败: {}", spec.name))?;
        info!(cluster = %spec.name, nodes = solos.len(), "MySQL 拓扑解析完成");
        Ok(serde_json::to_value(solos)?)
    }

    pub async fn probe(&self, cluster: Option<&str>) -> Result<Value> {
        let factory = ExecutorFactory::from_config(&self.config, self.registry, self.http.clone())
            .context("构建执行器失败")?;

        if let Some(name) = cluster {
            let executor = factory
                .get_executor(name)
                .ok_or_else(|| anyhow::anyhow!("集群未配置: {name}"))?;
            let capability = executor.probe().await;
            if !capability.supported {
                warn!(cluster = %name, reason = ?capability.reason, "集群不可用");
            }
            let single = BTreeMap::from([(name.to_string(), capability)]);
            return Ok(serde_json::to_value(single)?);
        }

        let clusters = factory.probe_all().await;
        let addons = AddonManager::from_config(&self.config, self.http.clone());
        let mut operators = BTreeMap::new();
        for kind in AddonKind::ALL {
            operators.insert(kind.to_string(), addons.probe(kind).await);
        }
        Ok(json!({ "clusters": clusters, "addons": operators }))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("读取文件失败: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("解析JSON失败: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;
    use workload_worker::register_builtin_kinds;

    use super::*;

    fn registry() -> ExecutorRegistry {
        let registry = ExecutorRegistry::new();
        register_builtin_kinds(&registry);
        registry
    }

    fn json_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_kinds_are_sorted() {
        let registry = registry();
        let app = Application::new(AppConfig::default(), &registry).unwrap();
        assert_eq!(
            app.kinds(),
            json!(["FLINK", "K8SFLINK", "K8SSPARK", "METRONOME", "SPARK"])
        );
    }

    #[test]
    fn test_constraints_for_empty_labels() {
        let registry = registry();
        let app = Application::new(AppConfig::default(), &registry).unwrap();
        let labels = json_file("{}");
        let dcos = app.constraints(labels.path(), false).unwrap();
        assert_eq!(dcos.as_array().unwrap().len(), 2);
        assert_eq!(dcos[0]["operator"], "LIKE");
        assert_eq!(dcos[0]["attribute"], "dice_tags");
        assert_eq!(dcos[1]["operator"], "UNLIKE");
    }

    #[test]
    fn test_mysql_resolve_from_file() {
        let registry = registry();
        let app = Application::new(AppConfig::default(), &registry).unwrap();
        let spec = json_file(r#"{"name": "orders", "replicas": 2}"#);
        let solos = app.mysql_resolve(spec.path()).unwrap();
        assert_eq!(solos.as_array().unwrap().len(), 3);
        assert_eq!(solos[0]["sourceId"], -1);
        assert_eq!(solos[2]["host"], "orders-2.orders");

        let bad = json_file(r#"{"name": "orders", "exporterPort": 3306}"#);
        assert!(app.mysql_resolve(bad.path()).is_err());
    }
}
