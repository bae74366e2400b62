use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use workload_core::{
    BackendHandle, Capability, ClusterConfig, HttpClient, Kind, Name, Result, StatusCode, StatusDesc,
    TaskExecutor, TaskSpec, WorkloadError,
};
use workload_dispatcher::compile_k8s;
use workload_domain::status::{normalize, NativeSource};
use workload_domain::transform::validate_task;
use workload_infrastructure::{
    record_executor_request, record_status_unknown, resource_path, CreateOutcome, K8sApi,
};

use super::k8s_common::{
    env_vars, pod_volumes, prepare_namespace, resource_ref, EnvVar, ObjectMeta, Volume, VolumeMount,
};
use super::require_address;

pub const API_VERSION: &str = "sparkoperator.k8s.io/v1beta2";
pub const RESOURCE: &str = "sparkapplications";
pub const SERVICE_ACCOUNT: &str = "spark";
pub const ROLE: &str = "spark-role";
pub const ROLE_BINDING: &str = "spark-role-binding";
const RBAC_API_VERSION: &str = "rbac.authorization.k8s.io/v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparkApplication {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: SparkApplicationSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparkApplicationSpec {
    #[serde(rename = "type")]
    pub app_type: String,
    pub mode: String,
    pub image: String,
    pub image_pull_policy: String,
    pub main_class: String,
    pub main_application_file: String,
    pub arguments: Vec<String>,
    pub spark_version: String,
    pub restart_policy: RestartPolicy,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub spark_conf: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
    pub driver: SparkPodSpec,
    pub executor: SparkPodSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    #[serde(rename = "type")]
    pub policy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparkPodSpec {
    pub cores: u32,
    pub core_limit: String,
    pub memory: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    pub env: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppView {
    #[serde(default)]
    status: AppStatusView,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppStatusView {
    #[serde(default)]
    application_state: AppStateView,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppStateView {
    #[serde(default)]
    state: String,
    #[serde(default)]
    error_message: String,
}

/// Kubernetes 上由 spark-operator 驱动的 Spark 作业
pub struct K8sSparkExecutor {
    kind: Kind,
    name: Name,
    cluster: ClusterConfig,
    api: K8sApi,
}

impl K8sSparkExecutor {
    pub fn new(name: Name, cluster: &ClusterConfig, http: Arc<dyn HttpClient>) -> Result<Self> {
        let api = K8sApi::new(http, require_address(cluster)?).with_cluster(cluster.name.clone());
        Ok(Self {
            kind: Kind::new(Kind::K8S_SPARK),
            name,
            cluster: cluster.clone(),
            api,
        })
    }

    pub fn constructor(
        name: Name,
        cluster: &ClusterConfig,
        http: Arc<dyn HttpClient>,
    ) -> Result<Arc<dyn TaskExecutor>> {
        Ok(Arc::new(Self::new(name, cluster, http)?))
    }

    /// 删除任务 namespace 及其中所有 SparkApplication，不存在不算错误
    pub async fn clean_up(&self, namespace: &str) -> Result<()> {
        if namespace.trim().is_empty() {
            return Err(WorkloadError::validation_error("namespace 不能为空"));
        }
        self.api.delete_namespace(namespace).await?;
        info!(namespace = %namespace, "Spark 任务 namespace 已回收");
        Ok(())
    }

    pub fn build_application(&self, task: &TaskSpec) -> Result<SparkApplication> {
        validate_task(task)?;
        let bigdata = task.bigdata.as_ref().ok_or_else(|| {
            WorkloadError::config_error(format!(
                "Spark 任务缺少大数据参数: {}/{}",
                task.namespace, task.name
            ))
        })?;
        if task.image.trim().is_empty() {
            return Err(WorkloadError::config_error(format!(
                "Spark 任务缺少镜像: {}/{}",
                task.namespace, task.name
            )));
        }
        let resources = bigdata.spark.clone().unwrap_or_default();
        let volumes = pod_volumes(task, &self.cluster)?;
        let env = env_vars(task, &self.cluster);
        let node_selector = compile_k8s(&task.labels, &self.cluster.placement).common_node_selector();
        let is_python = bigdata.resource.ends_with(".py");

        let mut pod_labels = BTreeMap::new();
        pod_labels.insert("job-type".to_string(), "k8s-spark".to_string());
        pod_labels.insert("spark-version".to_string(), resources.spark_version.clone());

        let pod = |cores: f64, memory_mib: u64| {
            let cores = cores.ceil().max(1.0) as u32;
            SparkPodSpec {
                cores,
                core_limit: cores.to_string(),
                memory: format!("{memory_mib}m"),
                labels: pod_labels.clone(),
                env: env.clone(),
                volume_mounts: volumes.mounts.clone(),
                service_account: None,
                instances: None,
            }
        };
        let driver = SparkPodSpec {
            service_account: Some(SERVICE_ACCOUNT.to_string()),
            ..pod(resources.driver_cores, resources.driver_memory_mib)
        };
        let executor = SparkPodSpec {
            instances: Some(resources.executor_instances.max(1)),
            ..pod(resources.executor_cores, resources.executor_memory_mib)
        };

        Ok(SparkApplication {
            api_version: API_VERSION.to_string(),
            kind: "SparkApplication".to_string(),
            metadata: ObjectMeta {
                name: task.k8s_name(),
                namespace: task.k8s_namespace(),
                labels: pod_labels.clone(),
            },
            spec: SparkApplicationSpec {
                app_type: if is_python { "Python" } else { "Scala" }.to_string(),
                mode: "cluster".to_string(),
                image: task.image.clone(),
                image_pull_policy: "Always".to_string(),
                main_class: bigdata.main_class.clone(),
                main_application_file: bigdata.resource.clone(),
                arguments: bigdata.main_args.clone(),
                spark_version: resources.spark_version.clone(),
                restart_policy: RestartPolicy {
                    policy: "Never".to_string(),
                },
                spark_conf: resources.properties.clone(),
                volumes: volumes.volumes,
                node_selector,
                python_version: is_python.then(|| "3".to_string()),
                driver,
                executor,
            },
        })
    }

    async fn ensure_rbac(&self, namespace: &str) -> Result<()> {
        let account = json!({
            "apiVersion": "v1",
            "kind": "ServiceAccount",
            "metadata": { "name": SERVICE_ACCOUNT, "namespace": namespace },
        });
        let role = json!({
            "apiVersion": RBAC_API_VERSION,
            "kind": "Role",
            "metadata": { "name": ROLE, "namespace": namespace },
            "rules": [
                { "apiGroups": [""], "resources": ["pods"], "verbs": ["*"] },
                { "apiGroups": [""], "resources": ["services"], "verbs": ["*"] },
            ],
        });
        let binding = json!({
            "apiVersion": RBAC_API_VERSION,
            "kind": "RoleBinding",
            "metadata": { "name": ROLE_BINDING, "namespace": namespace },
            "subjects": [
                { "kind": "ServiceAccount", "namespace": namespace, "name": SERVICE_ACCOUNT },
            ],
            "roleRef": { "kind": "Role", "name": ROLE, "apiGroup": "rbac.authorization.k8s.io" },
        });
        self.api
            .create(&resource_path("v1", Some(namespace), "serviceaccounts", None), &account)
            .await?;
        self.api
            .create(&resource_path(RBAC_API_VERSION, Some(namespace), "roles", None), &role)
            .await?;
        self.api
            .create(&resource_path(RBAC_API_VERSION, Some(namespace), "rolebindings", None), &binding)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TaskExecutor for K8sSparkExecutor {
    fn kind(&self) -> &Kind {
        &self.kind
    }

    fn name(&self) -> &Name {
        &self.name
    }

    async fn create(&self, task: &TaskSpec) -> Result<BackendHandle> {
        record_executor_request(self.kind.as_str(), "create");
        let app = self.build_application(task)?;
        let volumes = pod_volumes(task, &self.cluster)?;
        let namespace = app.metadata.namespace.clone();
        let name = app.metadata.name.clone();

        prepare_namespace(&self.api, &namespace, &volumes.claims).await?;
        self.ensure_rbac(&namespace).await?;

        let outcome = self
            .api
            .create(&resource_path(API_VERSION, Some(&namespace), RESOURCE, None), &app)
            .await?;
        match outcome {
            CreateOutcome::Created => info!(namespace = %namespace, name = %name, "SparkApplication 已创建"),
            CreateOutcome::AlreadyExists => {
                info!(namespace = %namespace, name = %name, "SparkApplication 已存在")
            }
        }
        Ok(BackendHandle::CustomResource { namespace, name })
    }

    async fn status(&self, task: &TaskSpec) -> Result<StatusDesc> {
        record_executor_request(self.kind.as_str(), "status");
        let (namespace, name) = resource_ref(task);
        let app: Option<AppView> = self
            .api
            .get(&resource_path(API_VERSION, Some(&namespace), RESOURCE, Some(&name)))
            .await?;
        let Some(app) = app else {
            return Ok(StatusDesc::not_found());
        };
        let state = app.status.application_state;
        let mut desc = normalize(NativeSource::SparkOperator, &state.state);
        if desc.status == StatusCode::Unknown {
            warn!(namespace = %namespace, name = %name, state = %state.state, "SparkApplication 状态未知");
            record_status_unknown(self.kind.as_str());
        }
        if !state.error_message.is_empty() {
            desc.last_message = if desc.last_message.is_empty() {
                state.error_message
            } else {
                format!("{}: {}", desc.last_message, state.error_message)
            };
        }
        Ok(desc)
    }

    /// 没有应用名也没有句柄的任务代表整个 namespace，直接回收 namespace
    async fn remove(&self, task: &TaskSpec) -> Result<()> {
        record_executor_request(self.kind.as_str(), "remove");
        if task.handle.is_none() && task.name.trim().is_empty() {
            return self.clean_up(&task.k8s_namespace()).await;
        }
        let (namespace, name) = resource_ref(task);
        let existed = self
            .api
            .delete(&resource_path(API_VERSION, Some(&namespace), RESOURCE, Some(&name)))
            .await?;
        if !existed {
            info!(namespace = %namespace, name = %name, "SparkApplication 已不存在");
        }
        Ok(())
    }

    async fn probe(&self) -> Capability {
        self.api.supports(API_VERSION, RESOURCE).await
    }
}
