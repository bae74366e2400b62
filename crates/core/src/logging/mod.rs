//! 日志配置；subscriber 由二进制入口初始化

pub mod log_config;
pub mod log_level;

pub use log_config::{LogConfig, LogOutput, OutputFormat};
pub use log_level::LogLevel;
