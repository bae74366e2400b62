use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use workload_core::{global_registry, AppConfig, LogConfig, LogLevel, LogOutput, OutputFormat};
use workload_worker::register_builtin_kinds;

mod app;

use app::Application;

#[derive(Parser, Debug)]
#[command(name = "workload")]
#[command(version = "1.0.0")]
#[command(about = "多后端工作负载执行层 - 命令行工具")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径，不指定时按默认路径查找
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long, global = true, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式
    #[arg(long, global = true, value_parser = ["json", "pretty"])]
    log_format: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 列出已注册的执行器类型
    Kinds,
    /// 把标签文件编译成调度约束
    Constraints {
        /// JSON 格式的标签文件
        #[arg(long)]
        labels: PathBuf,
        /// 输出 Kubernetes 节点亲和性而不是 DC/OS 约束
        #[arg(long)]
        k8s: bool,
    },
    /// 解析 MySQL 复制拓扑
    MysqlResolve {
        /// JSON 格式的集群描述
        #[arg(long)]
        spec: PathBuf,
    },
    /// 探测后端集群能力
    Probe {
        /// 集群名，不指定时探测全部
        #[arg(long)]
        cluster: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())
        .with_context(|| format!("加载配置失败: {}", cli.config.as_deref().unwrap_or("默认路径")))?;
    let log = merge_log_config(&config.log, cli.log_level.as_deref(), cli.log_format.as_deref())?;
    init_logging(&log)?;
    info!(clusters = config.clusters.len(), "配置已加载");

    let registry = global_registry();
    register_builtin_kinds(registry);
    let app = Application::new(config, registry)?;
    let output = match cli.command {
        Commands::Kinds => app.kinds(),
        Commands::Constraints { labels, k8s } => app.constraints(&labels, k8s)?,
        Commands::MysqlResolve { spec } => app.mysql_resolve(&spec)?,
        Commands::Probe { cluster } => app.probe(cluster.as_deref()).await?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// 命令行参数覆盖配置文件中的日志设置
fn merge_log_config(base: &LogConfig, level: Option<&str>, format: Option<&str>) -> Result<LogConfig> {
    let mut log = base.clone();
    if let Some(level) = level {
        log.level = level.parse::<LogLevel>()?;
    }
    match format {
        Some("json") => log.format = OutputFormat::Json,
        Some("pretty") => log.format = OutputFormat::Pretty,
        Some(other) => return Err(anyhow::anyhow!("不支持的日志格式: {other}")),
        None => {}
    }
    Ok(log)
}

/// 初始化日志系统
fn init_logging(log: &LogConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log.filter_directive()));

    let writer = || match log.output {
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
    };
    let registry = tracing_subscriber::registry().with(env_filter);

    match log.format {
        OutputFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer()))
            .try_init()
            .context("初始化JSON日志格式失败")?,
        OutputFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(writer()))
            .try_init()
            .context("初始化Pretty日志格式失败")?,
    }

    Ok(())
}
