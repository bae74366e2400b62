use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use workload_core::{
    AppConfig, Capability, ExecutorRegistry, HttpClient, Kind, Result, TaskExecutor, TaskSpec,
    WorkloadError,
};

use crate::executors::{
    FlinkExecutor, K8sFlinkExecutor, K8sSparkExecutor, MetronomeExecutor, SparkExecutor,
};

/// 注册内置的全部执行器类型，重复调用会 panic
pub fn register_builtin_kinds(registry: &ExecutorRegistry) {
    registry.must_register(Kind::new(Kind::METRONOME), MetronomeExecutor::constructor);
    registry.must_register(Kind::new(Kind::SPARK), SparkExecutor::constructor);
    registry.must_register(Kind::new(Kind::FLINK), FlinkExecutor::constructor);
    registry.must_register(Kind::new(Kind::K8S_SPARK), K8sSparkExecutor::constructor);
    registry.must_register(Kind::new(Kind::K8S_FLINK), K8sFlinkExecutor::constructor);
}

/// 按配置为每个集群构造一个执行器实例
pub struct ExecutorFactory {
    executors: BTreeMap<String, Arc<dyn TaskExecutor>>,
}

impl ExecutorFactory {
    /// 集群没有单独配置调度豁免时继承全局 `placement`
    pub fn from_config(
        config: &AppConfig,
        registry: &ExecutorRegistry,
        http: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        info!("初始化 {} 个执行器", config.clusters.len());
        let mut executors = BTreeMap::new();
        for cluster in &config.clusters {
            let mut cluster = cluster.clone();
            if cluster.placement.is_empty() {
                cluster.placement = config.placement.clone();
            }
            let executor = registry.build(&cluster, http.clone())?;
            info!(name = %cluster.name, kind = %executor.kind(), "执行器已就绪");
            executors.insert(cluster.name.clone(), executor);
        }
        Ok(Self { executors })
    }

    pub fn get_executor(&self, name: &str) -> Option<Arc<dyn TaskExecutor>> {
        self.executors.get(name).cloned()
    }

    /// 按任务的集群名取执行器，并校验 Kind 一致
    pub fn for_task(&self, task: &TaskSpec) -> Result<Arc<dyn TaskExecutor>> {
        let executor = self
            .get_executor(&task.cluster_name)
            .ok_or_else(|| WorkloadError::ExecutorNotFound(task.cluster_name.clone()))?;
        if executor.kind() != &task.kind {
            return Err(WorkloadError::config_error(format!(
                "任务 {}/{} 的类型 {} 与集群 {} 的类型 {} 不一致",
                task.namespace,
                task.name,
                task.kind,
                task.cluster_name,
                executor.kind()
            )));
        }
        Ok(executor)
    }

    pub fn list_executors(&self) -> Vec<String> {
        self.executors.keys().cloned().collect()
    }

    /// 并发探测所有集群
    pub async fn probe_all(&self) -> BTreeMap<String, Capability> {
        let checks = self.executors.iter().map(|(name, executor)| async move {
            let capability = executor.probe().await;
            if !capability.supported {
                warn!(
                    name = %name,
                    reason = capability.reason.as_deref().unwrap_or_default(),
                    "集群不支持该执行器"
                );
            }
            (name.clone(), capability)
        });
        join_all(checks).await.into_iter().collect()
    }
}
