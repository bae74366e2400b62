//! 任务描述 → 后端载荷 的公共转换
//!
//! 各执行器共用这里的命令拼接、资源环境变量、卷规划和宿主机路径模板。
//! 这些函数都是纯函数，不访问网络。

pub mod command;
pub mod resources;
pub mod template;
pub mod volumes;

pub use command::*;
pub use resources::*;
pub use template::*;
pub use volumes::*;

use workload_core::{Result, TaskSpec, WorkloadError};

/// 提交前的基础校验
pub fn validate_task(spec: &TaskSpec) -> Result<()> {
    if spec.cluster_name.trim().is_empty() {
        return Err(WorkloadError::config_error(format!(
            "任务缺少集群名: {}/{}",
            spec.namespace, spec.name
        )));
    }
    if spec.name.trim().is_empty() {
        return Err(WorkloadError::validation_error("任务名不能为空"));
    }
    if !spec.cpu.is_finite() || !spec.memory.is_finite() || spec.cpu < 0.0 || spec.memory < 0.0 {
        return Err(WorkloadError::config_error(format!(
            "任务资源非法: cpu={}, memory={}",
            spec.cpu, spec.memory
        )));
    }
    Ok(())
}
