//! 后端执行器与执行器工厂
//!
//! 每个 `[[clusters]]` 配置项对应一个 [`TaskExecutor`](workload_core::TaskExecutor)
//! 实例，由 [`ExecutorFactory`] 按集群名路由。

pub mod executor_factory;
pub mod executors;

pub use executor_factory::{register_builtin_kinds, ExecutorFactory};
pub use executors::{
    FlinkExecutor, K8sFlinkExecutor, K8sSparkExecutor, MetronomeExecutor, SparkExecutor,
};
