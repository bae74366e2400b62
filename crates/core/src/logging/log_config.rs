use serde::{Deserialize, Serialize};

use crate::logging::log_level::LogLevel;

/// 日志配置，对应配置文件的 `[log]` 段
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: OutputFormat,
    pub output: LogOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Pretty,
}

/// 日志写到哪里；命令行输出占用 stdout，所以默认 stderr
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stderr,
    Stdout,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: OutputFormat::Pretty,
            output: LogOutput::Stderr,
        }
    }
}

impl LogConfig {
    /// `tracing_subscriber::EnvFilter` 使用的过滤指令
    ///
    /// 本仓库的 crate 使用配置的级别，依赖库只输出 warn 以上。
    pub fn filter_directive(&self) -> String {
        let level = self.level.as_filter();
        let mut directive = format!("warn,workload={level}");
        for krate in [
            "workload_core",
            "workload_domain",
            "workload_dispatcher",
            "workload_worker",
            "workload_addons",
            "workload_infrastructure",
        ] {
            directive.push_str(&format!(",{krate}={level}"));
        }
        directive
    }
}
