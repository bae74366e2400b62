use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use workload_core::{
    BackendHandle, Capability, ClusterConfig, HttpClient, HttpRequest, Kind, Method, Name, Result,
    StatusCode, StatusDesc, TaskExecutor, TaskSpec, WorkloadError,
};
use workload_dispatcher::{compile_dcos, Constraint};
use workload_domain::status::metronome_job_status;
use workload_domain::transform::{build_env, join_command, plan_binds, plan_volumes, validate_task, Platform};
use workload_infrastructure::{record_executor_request, record_status_unknown};

use super::{is_idempotent_conflict, require_address};

/// 卷宿主机根目录所在的集群环境变量
pub const ENV_STORAGE_MOUNTPOINT: &str = "DICE_STORAGE_MOUNTPOINT";
/// 以该前缀开头的环境变量值作为 Mesos fetcher 的下载地址
pub const FETCHER_URI_PREFIX: &str = "MESOS_FETCHER_URI";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetronomeJob {
    pub id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub run: JobRun,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    pub cpus: f64,
    pub mem: f64,
    pub disk: f64,
    pub env: BTreeMap<String, String>,
    pub restart: RestartPolicy,
    pub docker: Docker,
    #[serde(default)]
    pub volumes: Vec<JobVolume>,
    pub max_launch_delay: u64,
    pub placement: Placement,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    pub policy: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Docker {
    pub image: String,
    pub force_pull_image: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobVolume {
    pub container_path: String,
    pub host_path: String,
    /// `RO` 或 `RW`
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobView {
    #[serde(default)]
    active_runs: Vec<serde_json::Value>,
    #[serde(default)]
    history: Option<HistoryView>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryView {
    #[serde(default)]
    success_count: u64,
    #[serde(default)]
    failure_count: u64,
}

#[derive(Debug, Deserialize)]
struct RunView {
    id: String,
    #[serde(default)]
    status: String,
}

/// DC/OS Metronome 执行器
pub struct MetronomeExecutor {
    kind: Kind,
    name: Name,
    address: String,
    cluster: ClusterConfig,
    http: Arc<dyn HttpClient>,
}

impl MetronomeExecutor {
    pub fn new(name: Name, cluster: &ClusterConfig, http: Arc<dyn HttpClient>) -> Result<Self> {
        Ok(Self {
            kind: Kind::new(Kind::METRONOME),
            name,
            address: require_address(cluster)?,
            cluster: cluster.clone(),
            http,
        })
    }

    pub fn constructor(
        name: Name,
        cluster: &ClusterConfig,
        http: Arc<dyn HttpClient>,
    ) -> Result<Arc<dyn TaskExecutor>> {
        Ok(Arc::new(Self::new(name, cluster, http)?))
    }

    fn request(&self, method: Method, path: String) -> HttpRequest {
        HttpRequest::new(method, self.address.clone(), path).cluster(self.cluster.name.clone())
    }

    fn job_id(task: &TaskSpec) -> String {
        match &task.handle {
            Some(BackendHandle::Job { id }) => id.clone(),
            _ => task.job_name(),
        }
    }

    /// 任务描述 → Metronome 作业
    pub fn build_job(&self, task: &TaskSpec) -> Result<MetronomeJob> {
        validate_task(task)?;

        let env = build_env(task, &self.cluster.env, Platform::Dcos);

        let mut volumes = Vec::new();
        let planned = plan_volumes(task)?;
        if !planned.is_empty() {
            let mountpoint = self.cluster.env.get(ENV_STORAGE_MOUNTPOINT).ok_or_else(|| {
                WorkloadError::config_error(format!(
                    "集群 {} 缺少环境变量 {ENV_STORAGE_MOUNTPOINT}, 任务: {}/{}",
                    self.cluster.name, task.namespace, task.name
                ))
            })?;
            volumes.extend(planned.iter().map(|v| JobVolume {
                container_path: v.container_path.clone(),
                host_path: v.host_path(mountpoint),
                mode: "RW".to_string(),
            }));
        }
        for bind in plan_binds(&task.binds, &self.cluster.env)? {
            volumes.push(JobVolume {
                container_path: bind.container_path,
                host_path: bind.host_path,
                mode: if bind.read_only { "RO" } else { "RW" }.to_string(),
            });
        }

        let artifacts = env
            .iter()
            .filter(|(k, _)| k.starts_with(FETCHER_URI_PREFIX))
            .map(|(_, v)| Artifact { uri: v.clone() })
            .collect();

        let cmd = join_command(&task.cmd, &task.args);

        Ok(MetronomeJob {
            id: task.job_name(),
            labels: task.labels.clone(),
            description: Some(format!("{}/{}", task.namespace, task.name)),
            run: JobRun {
                cmd: (!cmd.is_empty()).then_some(cmd),
                cpus: task.cpu,
                mem: task.memory,
                disk: 0.0,
                env,
                restart: RestartPolicy {
                    policy: "NEVER".to_string(),
                },
                docker: Docker {
                    image: task.image.clone(),
                    force_pull_image: true,
                },
                volumes,
                max_launch_delay: 3600,
                placement: Placement {
                    constraints: compile_dcos(&task.labels, &self.cluster.placement),
                },
                artifacts,
            },
        })
    }

    async fn list_runs(&self, id: &str) -> Result<Option<Vec<RunView>>> {
        let resp = self
            .http
            .execute(self.request(Method::Get, format!("/v1/jobs/{id}/runs")))
            .await?;
        if resp.is_not_found() {
            return Ok(None);
        }
        if !resp.is_ok() {
            return Err(resp.into_error());
        }
        resp.json().map(Some)
    }
}

#[async_trait]
impl TaskExecutor for MetronomeExecutor {
    fn kind(&self) -> &Kind {
        &self.kind
    }

    fn name(&self) -> &Name {
        &self.name
    }

    async fn create(&self, task: &TaskSpec) -> Result<BackendHandle> {
        record_executor_request(self.kind.as_str(), "create");
        let job = self.build_job(task)?;

        let resp = self
            .http
            .execute(self.request(Method::Post, "/v1/jobs".to_string()).json(&job)?)
            .await?;
        if is_idempotent_conflict(&resp) {
            info!(job = %job.id, "Metronome 作业已存在");
        } else if !resp.is_ok() {
            return Err(resp.into_error());
        }

        let resp = self
            .http
            .execute(self.request(Method::Post, format!("/v1/jobs/{}/runs", job.id)))
            .await?;
        if is_idempotent_conflict(&resp) {
            info!(job = %job.id, "Metronome 作业已在运行");
        } else if !resp.is_ok() {
            return Err(resp.into_error());
        }

        info!(job = %job.id, cluster = %self.name, "Metronome 作业已提交");
        Ok(BackendHandle::Job { id: job.id })
    }

    async fn status(&self, task: &TaskSpec) -> Result<StatusDesc> {
        record_executor_request(self.kind.as_str(), "status");
        let id = Self::job_id(task);

        let resp = self
            .http
            .execute(
                self.request(Method::Get, format!("/v1/jobs/{id}"))
                    .query("embed", "activeRuns")
                    .query("embed", "history"),
            )
            .await?;
        if resp.is_not_found() {
            return Ok(StatusDesc::not_found());
        }
        if !resp.is_ok() {
            return Err(resp.into_error());
        }
        let job: JobView = resp.json()?;

        let Some(runs) = self.list_runs(&id).await? else {
            return Ok(StatusDesc::not_found());
        };
        let history = job.history.unwrap_or_default();
        let desc = metronome_job_status(
            runs.first().map(|r| r.status.as_str()),
            job.active_runs.len(),
            history.success_count as usize,
            history.failure_count as usize,
        );
        if desc.status == StatusCode::Unknown {
            warn!(job = %id, message = %desc.last_message, "Metronome 作业状态未知");
            record_status_unknown(self.kind.as_str());
        }
        Ok(desc)
    }

    async fn remove(&self, task: &TaskSpec) -> Result<()> {
        record_executor_request(self.kind.as_str(), "remove");
        let id = Self::job_id(task);

        for run in self.list_runs(&id).await?.unwrap_or_default() {
            let resp = self
                .http
                .execute(self.request(
                    Method::Post,
                    format!("/v1/jobs/{id}/runs/{}/actions/stop", run.id),
                ))
                .await?;
            if resp.is_not_found() {
                debug!(job = %id, run = %run.id, "run 已不存在");
            } else if !resp.is_ok() {
                return Err(resp.into_error());
            }
        }

        let resp = self
            .http
            .execute(self.request(Method::Delete, format!("/v1/jobs/{id}")))
            .await?;
        if resp.is_not_found() {
            info!(job = %id, "Metronome 作业已不存在，视为删除成功");
            return Ok(());
        }
        if !resp.is_ok() {
            return Err(resp.into_error());
        }
        info!(job = %id, "Metronome 作业已删除");
        Ok(())
    }

    async fn probe(&self) -> Capability {
        match self
            .http
            .execute(self.request(Method::Get, "/v1/jobs".to_string()))
            .await
        {
            Ok(resp) if resp.is_ok() => Capability::supported(),
            Ok(resp) => Capability::unsupported(format!("Metronome 返回 {}", resp.status)),
            Err(e) => Capability::unsupported(format!("无法访问 Metronome: {e}")),
        }
    }
}
