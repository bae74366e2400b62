use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use workload_core::{
    BackendHandle, Capability, ClusterConfig, HttpClient, Kind, Name, Result, StatusCode, StatusDesc,
    TaskExecutor, TaskSpec, WorkloadError,
};
use workload_dispatcher::{compile_k8s, NodeAffinity};
use workload_domain::status::{normalize, NativeSource};
use workload_domain::transform::{k8s_memory_quantity, validate_task};
use workload_infrastructure::{
    record_executor_request, record_status_unknown, resource_path, CreateOutcome, K8sApi,
};

use super::k8s_common::{
    env_vars, pod_volumes, prepare_namespace, resource_ref, EnvVar, ObjectMeta, Volume, VolumeMount,
};
use super::require_address;

pub const API_VERSION: &str = "flinkoperator.k8s.io/v1beta1";
pub const RESOURCE: &str = "flinkclusters";
/// 作业还没被 operator 拉起时没有 job 状态
const PENDING_STATE: &str = "Pending";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlinkCluster {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: FlinkClusterSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlinkClusterSpec {
    pub flink_version: String,
    pub image: ImageSpec,
    pub job_manager: ComponentSpec,
    pub task_manager: ComponentSpec,
    pub job: JobSpec,
    pub env_vars: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flink_properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    pub name: String,
    pub pull_policy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    pub resources: ResourceRequirements,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub requests: BTreeMap<String, String>,
    pub limits: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affinity {
    pub node_affinity: NodeAffinity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub jar_file: String,
    pub class_name: String,
    pub args: Vec<String>,
    pub parallelism: u32,
    pub restart_policy: String,
}

#[derive(Debug, Default, Deserialize)]
struct ClusterView {
    #[serde(default)]
    status: Option<ClusterStatusView>,
}

#[derive(Debug, Default, Deserialize)]
struct ClusterStatusView {
    #[serde(default)]
    components: ComponentsView,
}

#[derive(Debug, Default, Deserialize)]
struct ComponentsView {
    #[serde(default)]
    job: Option<JobStatusView>,
}

#[derive(Debug, Default, Deserialize)]
struct JobStatusView {
    #[serde(default)]
    state: String,
}

fn memory_resources(memory_mib: u64) -> ResourceRequirements {
    let memory = k8s_memory_quantity(memory_mib as f64);
    let pair = |m: &str| {
        BTreeMap::from([
            ("cpu".to_string(), "1".to_string()),
            ("memory".to_string(), m.to_string()),
        ])
    };
    ResourceRequirements {
        requests: pair(&memory),
        limits: pair(&memory),
    }
}

/// Kubernetes 上由 flink-operator 驱动的 Flink 作业集群
pub struct K8sFlinkExecutor {
    kind: Kind,
    name: Name,
    cluster: ClusterConfig,
    api: K8sApi,
}

impl K8sFlinkExecutor {
    pub fn new(name: Name, cluster: &ClusterConfig, http: Arc<dyn HttpClient>) -> Result<Self> {
        let api = K8sApi::new(http, require_address(cluster)?).with_cluster(cluster.name.clone());
        Ok(Self {
            kind: Kind::new(Kind::K8S_FLINK),
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

    pub fn build_cluster(&self, task: &TaskSpec) -> Result<FlinkCluster> {
        validate_task(task)?;
        let bigdata = task.bigdata.as_ref().ok_or_else(|| {
            WorkloadError::config_error(format!(
                "Flink 任务缺少大数据参数: {}/{}",
                task.namespace, task.name
            ))
        })?;
        if task.image.trim().is_empty() || bigdata.resource.trim().is_empty() {
            return Err(WorkloadError::config_error(format!(
                "Flink 任务缺少镜像或 jar: {}/{}",
                task.namespace, task.name
            )));
        }
        let resources = bigdata.flink.clone().unwrap_or_default();
        let volumes = pod_volumes(task, &self.cluster)?;
        let affinity = compile_k8s(&task.labels, &self.cluster.placement);
        let affinity = (!affinity.terms().is_empty()).then_some(Affinity {
            node_affinity: affinity,
        });

        let component = |replicas: Option<u32>, memory_mib: u64| ComponentSpec {
            replicas,
            resources: memory_resources(memory_mib),
            volumes: volumes.volumes.clone(),
            volume_mounts: volumes.mounts.clone(),
            affinity: affinity.clone(),
        };
        let slots = resources.task_slots.max(1);
        let parallelism = resources.parallelism.max(1);
        let task_managers = parallelism.div_ceil(slots);

        let mut labels = BTreeMap::new();
        labels.insert("job-type".to_string(), "k8s-flink".to_string());

        Ok(FlinkCluster {
            api_version: API_VERSION.to_string(),
            kind: "FlinkCluster".to_string(),
            metadata: ObjectMeta {
                name: task.k8s_name(),
                namespace: task.k8s_namespace(),
                labels,
            },
            spec: FlinkClusterSpec {
                flink_version: resources.flink_version.clone(),
                image: ImageSpec {
                    name: task.image.clone(),
                    pull_policy: "Always".to_string(),
                },
                job_manager: component(None, resources.job_manager_memory_mib),
                task_manager: component(Some(task_managers), resources.task_manager_memory_mib),
                job: JobSpec {
                    jar_file: bigdata.resource.clone(),
                    class_name: bigdata.main_class.clone(),
                    args: bigdata.main_args.clone(),
                    parallelism,
                    restart_policy: "Never".to_string(),
                },
                env_vars: env_vars(task, &self.cluster),
                flink_properties: BTreeMap::from([(
                    "taskmanager.numberOfTaskSlots".to_string(),
                    slots.to_string(),
                )]),
            },
        })
    }
}

#[async_trait]
impl TaskExecutor for K8sFlinkExecutor {
    fn kind(&self) -> &Kind {
        &self.kind
    }

    fn name(&self) -> &Name {
        &self.name
    }

    async fn create(&self, task: &TaskSpec) -> Result<BackendHandle> {
        record_executor_request(self.kind.as_str(), "create");
        let cluster = self.build_cluster(task)?;
        let claims = pod_volumes(task, &self.cluster)?.claims;
        let namespace = cluster.metadata.namespace.clone();
        let name = cluster.metadata.name.clone();

        prepare_namespace(&self.api, &namespace, &claims).await?;
        let outcome = self
            .api
            .create(&resource_path(API_VERSION, Some(&namespace), RESOURCE, None), &cluster)
            .await?;
        if outcome == CreateOutcome::AlreadyExists {
            info!(namespace = %namespace, name = %name, "FlinkCluster 已存在");
        } else {
            info!(namespace = %namespace, name = %name, "FlinkCluster 已创建");
        }
        Ok(BackendHandle::CustomResource { namespace, name })
    }

    async fn status(&self, task: &TaskSpec) -> Result<StatusDesc> {
        record_executor_request(self.kind.as_str(), "status");
        let (namespace, name) = resource_ref(task);
        let view: Option<ClusterView> = self
            .api
            .get(&resource_path(API_VERSION, Some(&namespace), RESOURCE, Some(&name)))
            .await?;
        let Some(view) = view else {
            return Ok(StatusDesc::not_found());
        };
        let state = view
            .status
            .and_then(|s| s.components.job)
            .map(|j| j.state)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| PENDING_STATE.to_string());
        let desc = normalize(NativeSource::FlinkOperator, &state);
        if desc.status == StatusCode::Unknown {
            warn!(namespace = %namespace, name = %name, state = %state, "FlinkCluster 作业状态未知");
            record_status_unknown(self.kind.as_str());
        }
        Ok(desc)
    }

    async fn remove(&self, task: &TaskSpec) -> Result<()> {
        record_executor_request(self.kind.as_str(), "remove");
        let (namespace, name) = resource_ref(task);
        if !self
            .api
            .delete(&resource_path(API_VERSION, Some(&namespace), RESOURCE, Some(&name)))
            .await?
        {
            info!(namespace = %namespace, name = %name, "FlinkCluster 已不存在");
        }
        Ok(())
    }

    async fn probe(&self) -> Capability {
        self.api.supports(API_VERSION, RESOURCE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workload_core::{BigdataConf, FlinkResources, HttpRequest, HttpResponse};

    struct NoHttp;

    #[async_trait]
    impl HttpClient for NoHttp {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse> {
            Err(WorkloadError::internal("unexpected request"))
        }
    }

    #[test]
    fn test_build_cluster() {
        let cluster = ClusterConfig::new("k8s-a", "K8SFLINK", "https://k8s:6443");
        let exec = K8sFlinkExecutor::new(Name::new("k8s-a"), &cluster, Arc::new(NoHttp)).unwrap();
        let mut conf = BigdataConf::new("/opt/flink/usrlib/job.jar", "org.example.Stream", vec![]);
        conf.flink = Some(FlinkResources {
            parallelism: 5,
            task_slots: 2,
            ..FlinkResources::default()
        });
        let task = TaskSpec::builder("12", Kind::new(Kind::K8S_FLINK))
            .cluster("k8s-a")
            .image("flink:1.17")
            .bigdata(conf)
            .build()
            .unwrap();

        let fc = exec.build_cluster(&task).unwrap();
        assert_eq!(fc.spec.task_manager.replicas, Some(3));
        assert_eq!(fc.spec.job.parallelism, 5);
        assert_eq!(fc.spec.flink_properties["taskmanager.numberOfTaskSlots"], "2");
        assert_eq!(fc.spec.job_manager.resources.limits["memory"], "1024Mi");
        assert!(fc.spec.job_manager.affinity.is_some());

        let json = serde_json::to_value(&fc).unwrap();
        assert_eq!(json["kind"], "FlinkCluster");
        assert_eq!(json["spec"]["job"]["jarFile"], "/opt/flink/usrlib/job.jar");
        assert!(json["spec"]["taskManager"]["affinity"]["nodeAffinity"]
            ["requiredDuringSchedulingIgnoredDuringExecution"]
            .is_object());
    }

    #[test]
    fn test_missing_job_state_is_pending() {
        let view: ClusterView = serde_json::from_str(r#"{"status":{"components":{}}}"#).unwrap();
        assert!(view.status.and_then(|s| s.components.job).is_none());
        assert_eq!(
            normalize(NativeSource::FlinkOperator, PENDING_STATE).status,
            StatusCode::Unschedulable
        );
    }
}
