//! 配置管理
//!
//! 加载顺序：默认值 → TOML 配置文件 → 环境变量（前缀 `WORKLOAD_`）。
//! 每个 `[[clusters]]` 条目对应一个执行器实例。

pub mod models;

pub use models::*;
