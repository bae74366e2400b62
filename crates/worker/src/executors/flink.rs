use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use workload_core::{
    BackendHandle, Capability, ClusterConfig, HttpClient, HttpRequest, Kind, Method, Name, Result,
    StatusCode, StatusDesc, TaskExecutor, TaskSpec, WorkloadError,
};
use workload_domain::status::{normalize, NativeSource};
use workload_domain::transform::validate_task;
use workload_infrastructure::{record_executor_request, record_status_unknown};

use super::require_address;

/// 资源里没有 jar 路径时使用的集群级 jar id
pub const OPTION_JAR_ID: &str = "jar_id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JarRunRequest {
    pub entry_class: String,
    pub program_args_list: Vec<String>,
    pub parallelism: u32,
}

#[derive(Debug, Deserialize)]
struct JarRunResponse {
    jobid: String,
}

#[derive(Debug, Deserialize)]
struct JobDetail {
    #[serde(default)]
    state: String,
}

/// Flink session 集群，通过 REST 运行已上传的 jar
pub struct FlinkExecutor {
    kind: Kind,
    name: Name,
    address: String,
    cluster: ClusterConfig,
    http: Arc<dyn HttpClient>,
}

impl FlinkExecutor {
    pub fn new(name: Name, cluster: &ClusterConfig, http: Arc<dyn HttpClient>) -> Result<Self> {
        Ok(Self {
            kind: Kind::new(Kind::FLINK),
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

    fn job_id(task: &TaskSpec) -> Option<&str> {
        match &task.handle {
            Some(BackendHandle::FlinkJob { job_id, .. }) => Some(job_id.as_str()),
            _ => None,
        }
    }

    /// jar id 取资源路径最后一段，缺省时用集群配置
    pub fn jar_id(&self, task: &TaskSpec) -> Result<String> {
        let from_resource = task
            .bigdata
            .as_ref()
            .and_then(|b| b.resource.trim().rsplit('/').next())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        from_resource
            .or_else(|| self.cluster.option(OPTION_JAR_ID).map(str::to_string))
            .ok_or_else(|| {
                WorkloadError::config_error(format!(
                    "Flink 任务缺少 jar: {}/{}",
                    task.namespace, task.name
                ))
            })
    }

    pub fn build_run(&self, task: &TaskSpec) -> Result<JarRunRequest> {
        validate_task(task)?;
        let bigdata = task.bigdata.as_ref().ok_or_else(|| {
            WorkloadError::config_error(format!(
                "Flink 任务缺少大数据参数: {}/{}",
                task.namespace, task.name
            ))
        })?;
        let parallelism = bigdata
            .flink
            .as_ref()
            .map(|f| f.parallelism)
            .or_else(|| {
                self.cluster
                    .option("parallelism")
                    .and_then(|p| p.parse().ok())
            })
            .unwrap_or(1)
            .max(1);
        Ok(JarRunRequest {
            entry_class: bigdata.main_class.clone(),
            program_args_list: bigdata.main_args.clone(),
            parallelism,
        })
    }

    async fn job_state(&self, job_id: &str) -> Result<Option<String>> {
        let resp = self
            .http
            .execute(self.request(Method::Get, format!("/jobs/{job_id}")))
            .await?;
        if resp.is_not_found() {
            return Ok(None);
        }
        if !resp.is_ok() {
            return Err(resp.into_error());
        }
        let detail: JobDetail = resp.json()?;
        Ok(Some(detail.state))
    }
}

#[async_trait]
impl TaskExecutor for FlinkExecutor {
    fn kind(&self) -> &Kind {
        &self.kind
    }

    fn name(&self) -> &Name {
        &self.name
    }

    async fn create(&self, task: &TaskSpec) -> Result<BackendHandle> {
        record_executor_request(self.kind.as_str(), "create");
        let run = self.build_run(task)?;
        let jar_id = self.jar_id(task)?;

        if let Some(BackendHandle::FlinkJob { jar_id, job_id }) = &task.handle {
            if self.job_state(job_id).await?.is_some() {
                info!(job = %job_id, "Flink 作业已运行，复用已有句柄");
                return Ok(BackendHandle::FlinkJob {
                    jar_id: jar_id.clone(),
                    job_id: job_id.clone(),
                });
            }
        }

        let resp = self
            .http
            .execute(
                self.request(Method::Post, format!("/jars/{jar_id}/run"))
                    .json(&run)?,
            )
            .await?;
        if !resp.is_ok() {
            return Err(resp.into_error());
        }
        let result: JarRunResponse = resp.json()?;
        info!(jar = %jar_id, job = %result.jobid, "Flink 作业已提交");
        Ok(BackendHandle::FlinkJob {
            jar_id,
            job_id: result.jobid,
        })
    }

    async fn status(&self, task: &TaskSpec) -> Result<StatusDesc> {
        record_executor_request(self.kind.as_str(), "status");
        let Some(job_id) = Self::job_id(task) else {
            return Ok(StatusDesc::not_found());
        };
        let Some(state) = self.job_state(job_id).await? else {
            return Ok(StatusDesc::not_found());
        };
        let desc = normalize(NativeSource::FlinkJob, &state);
        if desc.status == StatusCode::Unknown {
            warn!(job = %job_id, state = %state, "Flink 作业状态未知");
            record_status_unknown(self.kind.as_str());
        }
        Ok(desc)
    }

    async fn remove(&self, task: &TaskSpec) -> Result<()> {
        record_executor_request(self.kind.as_str(), "remove");
        let Some(job_id) = Self::job_id(task) else {
            return Ok(());
        };
        let resp = self
            .http
            .execute(
                self.request(Method::Patch, format!("/jobs/{job_id}"))
                    .query("mode", "cancel"),
            )
            .await?;
        if resp.is_not_found() {
            info!(job = %job_id, "Flink 作业已不存在");
            return Ok(());
        }
        if !resp.is_ok() {
            return Err(resp.into_error());
        }
        Ok(())
    }

    async fn probe(&self) -> Capability {
        match self
            .http
            .execute(self.request(Method::Get, "/overview".to_string()))
            .await
        {
            Ok(resp) if resp.is_ok() && resp.body.contains("flink-version") => Capability::supported(),
            Ok(resp) => Capability::unsupported(format!("Flink overview 异常: status={}", resp.status)),
            Err(e) => Capability::unsupported(format!("无法访问 Flink: {e}")),
        }
    }
}
