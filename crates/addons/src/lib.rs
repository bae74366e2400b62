//! 有状态中间件的 Kubernetes operator 封装
//!
//! 服务组通过 `USE_OPERATOR` 标签选择 operator（mysql、redis、elasticsearch、daemonset），
//! namespace 固定为 `{type}--{id}`。

pub mod daemonset;
pub mod elasticsearch;
pub mod manager;
pub mod mysql;
pub mod operator;
pub mod redis;

pub use daemonset::{DaemonSet, DaemonSetOperator};
pub use elasticsearch::{Elasticsearch, ElasticsearchOperator, ElasticsearchResource};
pub use manager::{AddonManager, AddonResource};
pub use mysql::{MysqlCluster, MysqlOperator, PasswordGenerator};
pub use operator::{AddonKind, AddonOperator, LABEL_USE_OPERATOR, LABEL_VERSION};
pub use redis::{RedisFailover, RedisOperator, RedisResource};
