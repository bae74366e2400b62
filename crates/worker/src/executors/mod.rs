//! 各后端执行器
//!
//! | Kind | 后端 | 句柄 |
//! |------|------|------|
//! | `METRONOME` | DC/OS Metronome `/v1/jobs` | `Job` |
//! | `SPARK` | Spark standalone REST `/v1/submissions` | `Submission` |
//! | `FLINK` | Flink REST `/jars/{id}/run` | `FlinkJob` |
//! | `K8SSPARK` | `SparkApplication` CR | `CustomResource` |
//! | `K8SFLINK` | `FlinkCluster` CR | `CustomResource` |

pub mod flink;
pub mod k8s_common;
pub mod k8s_flink;
pub mod k8s_spark;
pub mod metronome;
pub mod spark;

pub use flink::FlinkExecutor;
pub use k8s_flink::K8sFlinkExecutor;
pub use k8s_spark::K8sSparkExecutor;
pub use metronome::MetronomeExecutor;
pub use spark::SparkExecutor;

use workload_core::{ClusterConfig, HttpResponse, Result, WorkloadError};

/// 后端返回的"已存在/已在运行"类消息
pub(crate) fn is_idempotent_conflict(resp: &HttpResponse) -> bool {
    if resp.is_conflict() {
        return true;
    }
    let body = resp.body.to_lowercase();
    body.contains("already exists") || body.contains("already running") || body.contains("already been")
}

pub(crate) fn require_address(cluster: &ClusterConfig) -> Result<String> {
    let address = cluster.address.trim();
    if address.is_empty() {
        return Err(WorkloadError::config_error(format!(
            "集群地址为空: {}",
            cluster.name
        )));
    }
    Ok(address.trim_end_matches('/').to_string())
}
