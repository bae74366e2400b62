//! 任务执行器接口定义
//!
//! 每一种后端（Metronome、Spark、Flink、Kubernetes 上的大数据 operator）
//! 都实现同一个 [`TaskExecutor`] 契约：
//! - `create`：提交转换后的作业，"已存在"视为成功
//! - `status`：查询后端并规范化为 [`StatusDesc`]，404 映射为 `NotFoundInCluster`
//! - `remove`：尽力删除，404 视为已删除
//! - `batch_delete`：顺序删除，遇到第一个硬错误即返回
//!
//! 执行器实例在构造时绑定到一个后端集群，不保存任何任务级的可变状态，
//! 任务标识和后端句柄每次调用都由参数传入，因此同一个实例可以被并发调用。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    errors::Result,
    models::{BackendHandle, Kind, Name, StatusDesc, TaskSpec},
};

/// 能力探测结果
///
/// 探测失败只会降级为"此集群不支持"，不会中断进程。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub supported: bool,
    pub reason: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl Capability {
    pub fn supported() -> Self {
        Self {
            supported: true,
            reason: None,
            checked_at: Utc::now(),
        }
    }

    pub fn unsupported<S: Into<String>>(reason: S) -> Self {
        Self {
            supported: false,
            reason: Some(reason.into()),
            checked_at: Utc::now(),
        }
    }
}

/// 后端执行器
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    fn kind(&self) -> &Kind;

    /// 执行器绑定的集群/实例名
    fn name(&self) -> &Name;

    async fn create(&self, task: &TaskSpec) -> Result<BackendHandle>;

    async fn status(&self, task: &TaskSpec) -> Result<StatusDesc>;

    async fn remove(&self, task: &TaskSpec) -> Result<()>;

    /// 没有后端句柄的任务从未提交成功，直接跳过
    async fn batch_delete(&self, tasks: &[TaskSpec]) -> Result<()> {
        for task in tasks {
            if task.handle.is_none() {
                debug!(
                    namespace = %task.namespace,
                    name = %task.name,
                    "任务没有后端句柄，跳过删除"
                );
                continue;
            }
            self.remove(task).await?;
        }
        Ok(())
    }

    async fn probe(&self) -> Capability;
}
