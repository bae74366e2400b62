use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::{debug, info};

use crate::{
    config::ClusterConfig,
    errors::{Result, WorkloadError},
    models::{Kind, Name},
    traits::{HttpClient, TaskExecutor},
};

/// 执行器构造函数：每个配置的集群调用一次
pub type ExecutorConstructor =
    fn(Name, &ClusterConfig, Arc<dyn HttpClient>) -> Result<Arc<dyn TaskExecutor>>;

/// Kind → 构造函数 的注册表
///
/// 启动阶段单线程写入，之后只读，可并发查找。重复注册同一个 Kind
/// 说明接线有误，`register` 返回错误，`must_register` 直接 panic。
pub struct ExecutorRegistry {
    constructors: RwLock<HashMap<Kind, ExecutorConstructor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, kind: Kind, constructor: ExecutorConstructor) -> Result<()> {
        let mut table = self
            .constructors
            .write()
            .map_err(|e| WorkloadError::internal(format!("执行器注册表锁已损坏: {e}")))?;
        if table.contains_key(&kind) {
            return Err(WorkloadError::DuplicateKind(kind.to_string()));
        }
        info!(kind = %kind, "注册执行器类型");
        table.insert(kind, constructor);
        Ok(())
    }

    /// 启动期注册，重复注册直接 panic
    pub fn must_register(&self, kind: Kind, constructor: ExecutorConstructor) {
        if let Err(e) = self.register(kind, constructor) {
            panic!("执行器注册失败: {e}");
        }
    }

    pub fn factory(&self, kind: &Kind) -> Result<ExecutorConstructor> {
        let table = self
            .constructors
            .read()
            .map_err(|e| WorkloadError::internal(format!("执行器注册表锁已损坏: {e}")))?;
        table
            .get(kind)
            .copied()
            .ok_or_else(|| WorkloadError::ExecutorNotFound(kind.to_string()))
    }

    pub fn contains(&self, kind: &Kind) -> bool {
        self.constructors
            .read()
            .map(|table| table.contains_key(kind))
            .unwrap_or(false)
    }

    /// 已注册的 Kind，按字典序
    pub fn kinds(&self) -> Vec<Kind> {
        let mut kinds: Vec<Kind> = self
            .constructors
            .read()
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default();
        kinds.sort();
        kinds
    }

    /// 按集群配置构造执行器实例
    pub fn build(
        &self,
        cluster: &ClusterConfig,
        http: Arc<dyn HttpClient>,
    ) -> Result<Arc<dyn TaskExecutor>> {
        let kind = Kind::new(cluster.kind.as_str());
        let constructor = self.factory(&kind)?;
        debug!(kind = %kind, name = %cluster.name, "构造执行器实例");
        constructor(Name::new(cluster.name.as_str()), cluster, http)
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_REGISTRY: OnceLock<ExecutorRegistry> = OnceLock::new();

/// 进程级注册表
pub fn global_registry() -> &'static ExecutorRegistry {
    GLOBAL_REGISTRY.get_or_init(ExecutorRegistry::new)
}
