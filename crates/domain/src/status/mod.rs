//! 状态规范化
//!
//! 各后端原生状态字符串 → [`StatusCode`](workload_core::StatusCode) 的映射表，
//! 以及规范状态之间的合法迁移。

pub mod machine;
pub mod tables;

pub use machine::*;
pub use tables::*;
