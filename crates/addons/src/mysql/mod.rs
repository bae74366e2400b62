//! MySQL addon：拓扑解析、root 密码生成、Mysql CR 的生命周期

pub mod operator;
pub mod password;
pub mod topology;

pub use operator::{MysqlCluster, MysqlOperator, MysqlSpec, MYSQL_API_VERSION, MYSQL_RESOURCE};
pub use password::PasswordGenerator;
pub use topology::{resolve, ClusterSpec, PrimaryMode, SoloOverride, SoloSpec};
