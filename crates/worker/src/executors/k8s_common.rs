//! Kubernetes 上大数据执行器共用的对象与准备步骤

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use workload_core::{BackendHandle, ClusterConfig, Result, TaskSpec};
use workload_domain::transform::{build_env, plan_binds, plan_volumes, Platform, VolumeSource};
use workload_infrastructure::{resource_path, K8sApi};

/// 新建 PVC 的容量
pub const DEFAULT_CLAIM_CAPACITY: &str = "10Gi";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<HostPathSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<ClaimSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPathSource {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSource {
    pub claim_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
    #[serde(default)]
    pub read_only: bool,
}

/// 需要新建的 PVC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    pub name: String,
    pub storage_class: String,
}

impl ClaimRequest {
    pub fn manifest(&self, namespace: &str) -> serde_json::Value {
        json!({
            "apiVersion": "v1",
            "kind": "PersistentVolumeClaim",
            "metadata": { "name": self.name, "namespace": namespace },
            "spec": {
                "accessModes": ["ReadWriteOnce"],
                "storageClassName": self.storage_class,
                "resources": { "requests": { "storage": DEFAULT_CLAIM_CAPACITY } },
            },
        })
    }
}

/// 任务在 Kubernetes 上的卷、挂载与待建 PVC
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodVolumes {
    pub volumes: Vec<Volume>,
    pub mounts: Vec<VolumeMount>,
    pub claims: Vec<ClaimRequest>,
}

pub fn pod_volumes(task: &TaskSpec, cluster: &ClusterConfig) -> Result<PodVolumes> {
    let mut out = PodVolumes::default();
    for planned in plan_volumes(task)? {
        let claim_name = match &planned.source {
            VolumeSource::Existing { id } => id.clone(),
            VolumeSource::Provision { id, storage_class } => {
                out.claims.push(ClaimRequest {
                    name: id.clone(),
                    storage_class: storage_class.clone(),
                });
                id.clone()
            }
        };
        out.volumes.push(Volume {
            name: planned.name.clone(),
            host_path: None,
            persistent_volume_claim: Some(ClaimSource { claim_name }),
        });
        out.mounts.push(VolumeMount {
            name: planned.name,
            mount_path: planned.container_path,
            read_only: false,
        });
    }
    for (i, bind) in plan_binds(&task.binds, &cluster.env)?.into_iter().enumerate() {
        let name = format!("bind-{i}");
        out.volumes.push(Volume {
            name: name.clone(),
            host_path: Some(HostPathSource {
                path: bind.host_path,
            }),
            persistent_volume_claim: None,
        });
        out.mounts.push(VolumeMount {
            name,
            mount_path: bind.container_path,
            read_only: bind.read_only,
        });
    }
    Ok(out)
}

/// 容器环境变量：任务变量、资源变量、集群变量依次覆盖
pub fn env_vars(task: &TaskSpec, cluster: &ClusterConfig) -> Vec<EnvVar> {
    build_env(task, &cluster.env, Platform::Kubernetes)
        .into_iter()
        .map(|(name, value)| EnvVar { name, value })
        .collect()
}

/// CR 所在的 namespace 与名字，优先取句柄
pub fn resource_ref(task: &TaskSpec) -> (String, String) {
    match &task.handle {
        Some(BackendHandle::CustomResource { namespace, name }) => (namespace.clone(), name.clone()),
        _ => (task.k8s_namespace(), task.k8s_name()),
    }
}

/// 确保 namespace 与 PVC 存在，已存在不算错误
pub async fn prepare_namespace(api: &K8sApi, namespace: &str, claims: &[ClaimRequest]) -> Result<()> {
    api.ensure_namespace(namespace).await?;
    for claim in claims {
        let outcome = api
            .create(
                &resource_path("v1", Some(namespace), "persistentvolumeclaims", None),
                &claim.manifest(namespace),
            )
            .await?;
        debug!(namespace = %namespace, claim = %claim.name, ?outcome, "PVC 已就绪");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use workload_core::{Bind, Kind, VolumeSpec};

    #[test]
    fn test_pod_volumes() {
        let cluster = ClusterConfig::new("k8s", "K8SSPARK", "https://k8s")
            .with_env("DICE_STORAGE_MOUNTPOINT", "/netdata");
        let task = TaskSpec::builder("5", Kind::new(Kind::K8S_SPARK))
            .cluster("k8s")
            .volume(VolumeSpec::new("/data", "local"))
            .volume(VolumeSpec::new("/cache", "nfs").with_id("shared"))
            .volume(VolumeSpec::new("/tmp/fake", "fake"))
            .bind(Bind::new("{{.DICE_STORAGE_MOUNTPOINT}}/m2", "/root/.m2", true))
            .build()
            .unwrap();

        let vols = pod_volumes(&task, &cluster).unwrap();
        assert_eq!(vols.volumes.len(), 3);
        assert_eq!(vols.claims.len(), 1);
        assert_eq!(vols.claims[0].name, "pipeline-pipeline-task-5-0");
        assert_eq!(vols.claims[0].storage_class, "dice-local-volume");
        assert_eq!(
            vols.volumes[1].persistent_volume_claim.as_ref().unwrap().claim_name,
            "shared"
        );
        assert_eq!(vols.volumes[2].host_path.as_ref().unwrap().path, "/netdata/m2");
        assert!(vols.mounts[2].read_only);

        let manifest = vols.claims[0].manifest("pipeline");
        assert_eq!(manifest["spec"]["resources"]["requests"]["storage"], "10Gi");
    }

    #[test]
    fn test_resource_ref_prefers_handle() {
        let task = TaskSpec::builder("5", Kind::new(Kind::K8S_FLINK))
            .cluster("k8s")
            .build()
            .unwrap();
        assert_eq!(
            resource_ref(&task),
            ("pipeline".to_string(), "pipeline-task-5".to_string())
        );
        let task = task.with_handle(BackendHandle::CustomResource {
            namespace: "ns".into(),
            name: "app".into(),
        });
        assert_eq!(resource_ref(&task), ("ns".to_string(), "app".to_string()));
    }
}
