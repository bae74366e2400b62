use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use workload_core::{
    AddonConfig, Capability, HealthStatus, PlacementConfig, Result, ServiceGroup, WorkloadError,
};
use workload_domain::transform::{k8s_cpu_quantity, k8s_memory_quantity};
use workload_infrastructure::{resource_path, K8sApi};

use crate::operator::{
    group_affinity, require_operator, service_domain, Affinity, AddonKind, AddonOperator,
    ObjectMeta, Versioned,
};

const API_VERSION: &str = "apps/v1";
const RESOURCE: &str = "daemonsets";
const APP_LABEL: &str = "app";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSet {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: DaemonSetSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSetSpec {
    pub selector: LabelSelector,
    pub template: PodTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    pub match_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodTemplate {
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    pub containers: Vec<Container>,
    pub affinity: Affinity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
    pub resources: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub container_port: u16,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DaemonSetStatus {
    #[serde(default)]
    desired_number_scheduled: u32,
    #[serde(default)]
    number_ready: u32,
}

#[derive(Debug, Deserialize)]
struct DaemonSetState {
    #[serde(default)]
    status: DaemonSetStatus,
}

/// 单服务服务组，每个节点跑一个副本
#[derive(Debug)]
pub struct DaemonSetOperator {
    api: K8sApi,
    placement: PlacementConfig,
}

impl DaemonSetOperator {
    pub fn new(api: K8sApi, _config: &AddonConfig, placement: PlacementConfig) -> Self {
        Self { api, placement }
    }

    fn path(namespace: &str, name: Option<&str>) -> String {
        resource_path(API_VERSION, Some(namespace), RESOURCE, name)
    }

    fn single_service(sg: &ServiceGroup) -> Result<&workload_core::Service> {
        match sg.services.as_slice() {
            [service] => Ok(service),
            services => Err(WorkloadError::validation_error(format!(
                "{}: DaemonSet 只支持单个服务，实际 {} 个",
                sg.namespace(),
                services.len()
            ))),
        }
    }
}

#[async_trait]
impl AddonOperator for DaemonSetOperator {
    type Resource = DaemonSet;

    fn kind(&self) -> AddonKind {
        AddonKind::DaemonSet
    }

    async fn is_supported(&self) -> Capability {
        self.api.supports(API_VERSION, RESOURCE).await
    }

    fn validate(&self, sg: &ServiceGroup) -> Result<()> {
        require_operator(sg, AddonKind::DaemonSet)?;
        let service = Self::single_service(sg)?;
        if service.image.trim().is_empty() {
            return Err(WorkloadError::validation_error(format!(
                "{}: 服务 {} 缺少镜像",
                sg.namespace(),
                service.name
            )));
        }
        Ok(())
    }

    fn convert(&self, sg: &ServiceGroup) -> Result<DaemonSet> {
        self.validate(sg)?;
        let service = Self::single_service(sg)?;
        let ns = sg.namespace();
        let selector = BTreeMap::from([(APP_LABEL.to_string(), service.name.clone())]);
        let mut pod_labels = service.labels.clone();
        pod_labels.extend(selector.clone());

        let quantities = BTreeMap::from([
            ("cpu".to_string(), k8s_cpu_quantity(service.cpu)),
            ("memory".to_string(), k8s_memory_quantity(service.memory)),
        ]);
        let container = Container {
            name: service.name.clone(),
            image: service.image.clone(),
            command: service
                .cmd
                .as_ref()
                .filter(|c| !c.trim().is_empty())
                .map(|c| vec!["sh".to_string(), "-c".to_string(), c.clone()])
                .unwrap_or_default(),
            env: service
                .env
                .iter()
                .map(|(name, value)| EnvVar {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            ports: service
                .ports
                .iter()
                .map(|p| ContainerPort { container_port: *p })
                .collect(),
            resources: BTreeMap::from([
                ("requests".to_string(), quantities.clone()),
                ("limits".to_string(), quantities),
            ]),
        };

        Ok(DaemonSet {
            api_version: API_VERSION.to_string(),
            kind: "DaemonSet".to_string(),
            metadata: ObjectMeta::new(service.name.clone(), ns.clone()).with_labels(sg.labels.clone()),
            spec: DaemonSetSpec {
                selector: LabelSelector {
                    match_labels: selector,
                },
                template: PodTemplate {
                    metadata: ObjectMeta::new(service.name.clone(), ns).with_labels(pod_labels),
                    spec: PodSpec {
                        containers: vec![container],
                        affinity: group_affinity(sg, &self.placement),
                    },
                },
            },
        })
    }

    async fn create(&self, ds: &DaemonSet) -> Result<()> {
        let ns = &ds.metadata.namespace;
        self.api.ensure_namespace(ns).await?;
        let outcome = self.api.create(&Self::path(ns, None), ds).await?;
        info!(namespace = %ns, name = %ds.metadata.name, outcome = ?outcome, "DaemonSet 已提交");
        Ok(())
    }

    async fn inspect(&self, sg: &ServiceGroup) -> Result<ServiceGroup> {
        let service = Self::single_service(sg)?;
        let ns = sg.namespace();
        let state: DaemonSetState = self
            .api
            .get(&Self::path(&ns, Some(&service.name)))
            .await?
            .ok_or_else(|| WorkloadError::not_found(format!("{ns}/{}", service.name)))?;
        let ready = state.status.desired_number_scheduled > 0
            && state.status.number_ready == state.status.desired_number_scheduled;

        let mut inspected = sg.clone();
        let name = service.name.clone();
        if let Some(s) = inspected.service_mut(&name) {
            s.status = HealthStatus::from_ready(ready);
            s.vip = Some(service_domain(&name, &ns));
        }
        inspected.refresh_status();
        Ok(inspected)
    }

    async fn remove(&self, sg: &ServiceGroup) -> Result<()> {
        let ns = sg.namespace();
        for service in &sg.services {
            if !self.api.delete(&Self::path(&ns, Some(&service.name))).await? {
                warn!(namespace = %ns, name = %service.name, "DaemonSet 不存在");
            }
        }
        self.api.delete_namespace(&ns).await
    }

    async fn update(&self, ds: &DaemonSet) -> Result<()> {
        let ns = &ds.metadata.namespace;
        let path = Self::path(ns, Some(&ds.metadata.name));
        let current: Versioned = self
            .api
            .get(&path)
            .await?
            .ok_or_else(|| WorkloadError::not_found(format!("{ns}/{}", ds.metadata.name)))?;
        let mut next = ds.clone();
        next.metadata.resource_version = current.metadata.resource_version;
        self.api.replace(&path, &next).await?;
        info!(namespace = %ns, name = %ds.metadata.name, "DaemonSet 已更新");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use workload_core::{HttpConfig, Service};
    use workload_infrastructure::ReqwestHttpClient;

    use super::*;
    use crate::operator::LABEL_USE_OPERATOR;

    fn operator() -> DaemonSetOperator {
        let http = ReqwestHttpClient::new(&HttpConfig::default()).unwrap();
        let api = K8sApi::new(Arc::new(http), "http://127.0.0.1:1");
        DaemonSetOperator::new(api, &AddonConfig::default(), PlacementConfig::default())
    }

    fn group(services: Vec<Service>) -> ServiceGroup {
        ServiceGroup {
            id: "d1".to_string(),
            kind: "addon-agent".to_string(),
            labels: BTreeMap::from([(LABEL_USE_OPERATOR.to_string(), "daemonset".to_string())]),
            services,
            ..ServiceGroup::default()
        }
    }

    fn agent() -> Service {
        Service {
            name: "log-agent".to_string(),
            image: "registry/agent:1.0".to_string(),
            cmd: Some("agent --config /etc/agent.yml".to_string()),
            ports: vec![7070],
            cpu: 0.2,
            memory: 128.0,
            ..Service::default()
        }
    }

    #[test]
    fn test_convert_single_service() {
        let ds = operator().convert(&group(vec![agent()])).unwrap();
        assert_eq!(ds.metadata.name, "log-agent");
        assert_eq!(ds.metadata.namespace, "addon-agent--d1");
        let container = &ds.spec.template.spec.containers[0];
        assert_eq!(container.command, vec!["sh", "-c", "agent --config /etc/agent.yml"]);
        assert_eq!(container.ports[0].container_port, 7070);
        assert_eq!(ds.spec.selector.match_labels["app"], "log-agent");
        assert_eq!(ds.spec.template.metadata.labels["app"], "log-agent");
    }

    #[test]
    fn test_validate_rejects_multiple_services() {
        let op = operator();
        assert!(op.validate(&group(vec![agent(), agent()])).is_err());
        let mut no_image = agent();
        no_image.image.clear();
        assert!(op.validate(&group(vec![no_image])).is_err());
    }
}
