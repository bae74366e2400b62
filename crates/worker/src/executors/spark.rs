use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use workload_core::{
    BackendHandle, Capability, ClusterConfig, HttpClient, HttpRequest, Kind, Method, Name, Result,
    SparkResources, StatusCode, StatusDesc, TaskExecutor, TaskSpec, WorkloadError,
};
use workload_domain::status::{normalize, NativeSource};
use workload_domain::transform::{build_env, validate_task, Platform};
use workload_infrastructure::{record_executor_request, record_status_unknown};

use super::require_address;

pub const OPTION_MASTER: &str = "master";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmissionRequest {
    pub action: String,
    pub app_resource: String,
    pub main_class: String,
    pub app_args: Vec<String>,
    pub client_spark_version: String,
    pub environment_variables: BTreeMap<String, String>,
    pub spark_properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub submission_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub driver_state: Option<String>,
}

/// Spark standalone 集群的 REST 提交网关
pub struct SparkExecutor {
    kind: Kind,
    name: Name,
    address: String,
    master: String,
    cluster: ClusterConfig,
    http: Arc<dyn HttpClient>,
}

impl SparkExecutor {
    pub fn new(name: Name, cluster: &ClusterConfig, http: Arc<dyn HttpClient>) -> Result<Self> {
        let address = require_address(cluster)?;
        let master = match cluster.option(OPTION_MASTER) {
            Some(master) => master.to_string(),
            None => {
                let host = address
                    .trim_start_matches("http://")
                    .trim_start_matches("https://");
                format!("spark://{host}")
            }
        };
        Ok(Self {
            kind: Kind::new(Kind::SPARK),
            name,
            address,
            master,
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

    fn submission_id(task: &TaskSpec) -> Option<&str> {
        match &task.handle {
            Some(BackendHandle::Submission { id }) => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn build_submission(&self, task: &TaskSpec) -> Result<CreateSubmissionRequest> {
        validate_task(task)?;
        let bigdata = task.bigdata.as_ref().ok_or_else(|| {
            WorkloadError::config_error(format!(
                "Spark 任务缺少大数据参数: {}/{}",
                task.namespace, task.name
            ))
        })?;
        if bigdata.resource.trim().is_empty() || bigdata.main_class.trim().is_empty() {
            return Err(WorkloadError::config_error(format!(
                "Spark 任务缺少 jar 或 main class: {}/{}",
                task.namespace, task.name
            )));
        }
        let resources = bigdata.spark.clone().unwrap_or_default();

        let mut props = BTreeMap::new();
        props.insert("spark.app.name".to_string(), task.job_name());
        props.insert("spark.master".to_string(), self.master.clone());
        props.insert("spark.jars".to_string(), bigdata.resource.clone());
        props.insert("spark.submit.deployMode".to_string(), "cluster".to_string());
        props.insert("spark.driver.supervise".to_string(), "false".to_string());
        insert_resources(&mut props, &resources);
        props.extend(resources.properties.clone());

        Ok(CreateSubmissionRequest {
            action: "CreateSubmissionRequest".to_string(),
            app_resource: bigdata.resource.clone(),
            main_class: bigdata.main_class.clone(),
            app_args: bigdata.main_args.clone(),
            client_spark_version: resources.spark_version.clone(),
            environment_variables: build_env(task, &self.cluster.env, Platform::Dcos),
            spark_properties: props,
        })
    }

    async fn query_status(&self, id: &str) -> Result<Option<SubmissionResponse>> {
        let resp = self
            .http
            .execute(self.request(Method::Get, format!("/v1/submissions/status/{id}")))
            .await?;
        if resp.is_not_found() {
            return Ok(None);
        }
        if !resp.is_ok() {
            return Err(resp.into_error());
        }
        let status: SubmissionResponse = resp.json()?;
        Ok(status.success.then_some(status))
    }
}

fn insert_resources(props: &mut BTreeMap<String, String>, r: &SparkResources) {
    props.insert("spark.driver.cores".to_string(), format_cores(r.driver_cores));
    props.insert("spark.driver.memory".to_string(), format!("{}m", r.driver_memory_mib));
    props.insert("spark.executor.cores".to_string(), format_cores(r.executor_cores));
    props.insert("spark.executor.memory".to_string(), format!("{}m", r.executor_memory_mib));
    props.insert(
        "spark.cores.max".to_string(),
        format_cores(r.executor_cores * r.executor_instances as f64),
    );
}

/// 网关消息里 `driver-...` 形式的 submission id
fn driver_id_in(message: &str) -> Option<String> {
    message
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '-')))
        .find(|w| w.len() > "driver-".len() && w.starts_with("driver-"))
        .map(str::to_string)
}

/// Spark 只接受整数核数，至少 1
fn format_cores(cores: f64) -> String {
    (cores.ceil().max(1.0) as u64).to_string()
}

#[async_trait]
impl TaskExecutor for SparkExecutor {
    fn kind(&self) -> &Kind {
        &self.kind
    }

    fn name(&self) -> &Name {
        &self.name
    }

    async fn create(&self, task: &TaskSpec) -> Result<BackendHandle> {
        record_executor_request(self.kind.as_str(), "create");
        let submission = self.build_submission(task)?;

        if let Some(id) = Self::submission_id(task) {
            if self.query_status(id).await?.is_some() {
                info!(submission = %id, "Spark 任务已提交过，复用已有句柄");
                return Ok(BackendHandle::Submission { id: id.to_string() });
            }
        }

        let resp = self
            .http
            .execute(
                self.request(Method::Post, "/v1/submissions/create".to_string())
                    .json(&submission)?,
            )
            .await?;
        if !resp.is_ok() {
            return Err(resp.into_error());
        }
        let result: SubmissionResponse = resp.json()?;
        let message = result.message.clone().unwrap_or_default();
        match (result.success, result.submission_id) {
            (true, Some(id)) => {
                info!(submission = %id, job = %task.job_name(), "Spark 任务已提交");
                Ok(BackendHandle::Submission { id })
            }
            (false, id) if message.to_lowercase().contains("already") => {
                let existing = id
                    .or_else(|| Self::submission_id(task).map(str::to_string))
                    .or_else(|| driver_id_in(&message));
                match existing {
                    Some(id) => {
                        info!(submission = %id, message = %message, "Spark 任务已存在，视为提交成功");
                        Ok(BackendHandle::Submission { id })
                    }
                    None => Err(WorkloadError::conflict(format!(
                        "Spark 任务已存在但无法确定 submission: {message}"
                    ))),
                }
            }
            _ => Err(WorkloadError::backend(200, format!("Spark 提交失败: {message}"))),
        }
    }

    async fn status(&self, task: &TaskSpec) -> Result<StatusDesc> {
        record_executor_request(self.kind.as_str(), "status");
        let Some(id) = Self::submission_id(task) else {
            return Ok(StatusDesc::not_found());
        };
        let Some(status) = self.query_status(id).await? else {
            return Ok(StatusDesc::not_found());
        };
        let native = status.driver_state.unwrap_or_default();
        let desc = normalize(NativeSource::SparkDriver, &native);
        if desc.status == StatusCode::Unknown {
            warn!(submission = %id, state = %native, "Spark driver 状态未知");
            record_status_unknown(self.kind.as_str());
        }
        Ok(desc)
    }

    async fn remove(&self, task: &TaskSpec) -> Result<()> {
        record_executor_request(self.kind.as_str(), "remove");
        let Some(id) = Self::submission_id(task) else {
            return Ok(());
        };
        let resp = self
            .http
            .execute(self.request(Method::Post, format!("/v1/submissions/kill/{id}")))
            .await?;
        if resp.is_not_found() {
            return Ok(());
        }
        if !resp.is_ok() {
            return Err(resp.into_error());
        }
        let result: SubmissionResponse = resp.json()?;
        if !result.success {
            info!(
                submission = %id,
                message = %result.message.unwrap_or_default(),
                "Spark 任务已不存在或已结束"
            );
        }
        Ok(())
    }

    /// 对未知 submission 查询状态，响应里带 `serverSparkVersion` 说明网关可用
    async fn probe(&self) -> Capability {
        match self
            .http
            .execute(self.request(Method::Get, "/v1/submissions/status/capability-check".to_string()))
            .await
        {
            Ok(resp) if resp.body.contains("serverSparkVersion") => Capability::supported(),
            Ok(resp) => Capability::unsupported(format!("不是 Spark REST 网关: status={}", resp.status)),
            Err(e) => Capability::unsupported(format!("无法访问 Spark: {e}")),
        }
    }
}
