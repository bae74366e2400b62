use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use workload_core::{
    AddonConfig, Capability, PlacementConfig, Result, ServiceGroup, WorkloadError,
};
use workload_domain::status::addon_health;
use workload_domain::transform::{k8s_cpu_quantity, k8s_memory_quantity};
use workload_infrastructure::{resource_path, CreateOutcome, K8sApi};

use super::password::PasswordGenerator;
use super::topology::{self, ClusterSpec, PrimaryMode, SoloSpec};
use crate::operator::{
    group_affinity, require_operator, require_exact_services, service_domain, Affinity, AddonKind,
    AddonOperator, ObjectMeta,
};

pub const MYSQL_API_VERSION: &str = "mysql.erda.cloud/v1";
pub const MYSQL_RESOURCE: &str = "mysqls";
pub const MYSQL_SERVICE: &str = "mysql";
const ROOT_PASSWORD_ENV: &str = "MYSQL_ROOT_PASSWORD";
const PRIMARY_MODE_LABEL: &str = "MYSQL_PRIMARY_MODE";
const PRIMARIES_LABEL: &str = "MYSQL_PRIMARIES";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MysqlCluster {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: MysqlSpec,
    #[serde(default, skip_serializing)]
    pub status: Option<MysqlStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MysqlSpec {
    pub version: String,
    pub primary_mode: PrimaryMode,
    pub primaries: u32,
    pub replicas: u32,
    pub primary_id: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    pub root_password: String,
    pub storage_class: String,
    pub storage_size: String,
    pub cpu_request: String,
    pub memory_request: String,
    pub solos: Vec<SoloSpec>,
    #[serde(default)]
    pub affinity: Affinity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MysqlStatus {
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub write_host: Option<String>,
}

/// update 时只关心线上对象的这几个字段
#[derive(Debug, Deserialize)]
struct LiveMysql {
    metadata: ObjectMeta,
    #[serde(default)]
    spec: LiveMysqlSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveMysqlSpec {
    #[serde(default)]
    replicas: u32,
    #[serde(default)]
    root_password: String,
}

#[derive(Debug)]
pub struct MysqlOperator {
    api: K8sApi,
    placement: PlacementConfig,
    default_version: String,
    storage_class: String,
    passwords: PasswordGenerator,
}

impl MysqlOperator {
    pub fn new(api: K8sApi, config: &AddonConfig, placement: PlacementConfig) -> Self {
        Self {
            api,
            placement,
            default_version: config.mysql_version.clone(),
            storage_class: config.storage_class.clone(),
            passwords: PasswordGenerator::default(),
        }
    }

    pub fn with_passwords(mut self, passwords: PasswordGenerator) -> Self {
        self.passwords = passwords;
        self
    }

    fn cr_path(namespace: &str, name: Option<&str>) -> String {
        resource_path(MYSQL_API_VERSION, Some(namespace), MYSQL_RESOURCE, name)
    }

    /// 服务组 → 集群级拓扑描述
    ///
    /// 服务的 scale 是节点总数，主节点数量和模式可用标签覆盖。
    pub fn cluster_spec(&self, sg: &ServiceGroup) -> Result<ClusterSpec> {
        let service = sg.service(MYSQL_SERVICE).ok_or_else(|| {
            WorkloadError::validation_error(format!("服务组 {} 缺少服务 mysql", sg.namespace()))
        })?;
        let primary_mode = match sg.labels.get(PRIMARY_MODE_LABEL).map(|m| m.to_ascii_lowercase()) {
            None => PrimaryMode::Classic,
            Some(m) if m == "classic" => PrimaryMode::Classic,
            Some(m) if m == "single" => PrimaryMode::Single,
            Some(m) if m == "multi" => PrimaryMode::Multi,
            Some(other) => {
                return Err(WorkloadError::validation_error(format!(
                    "不支持的主节点模式: {other}"
                )))
            }
        };
        let primaries = match sg.labels.get(PRIMARIES_LABEL) {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                WorkloadError::validation_error(format!("{PRIMARIES_LABEL} 不是整数: {raw}"))
            })?,
            None => 1,
        };
        if service.scale < primaries {
            return Err(WorkloadError::validation_error(format!(
                "mysql 节点数 {} 小于主节点数 {primaries}",
                service.scale
            )));
        }
        let version = sg
            .labels
            .get(crate::operator::LABEL_VERSION)
            .cloned()
            .unwrap_or_else(|| self.default_version.clone());
        let storage_class = service
            .volumes
            .first()
            .and_then(|v| v.storage_class.clone())
            .unwrap_or_else(|| self.storage_class.clone());

        Ok(ClusterSpec {
            name: MYSQL_SERVICE.to_string(),
            version,
            primary_mode,
            primaries,
            replicas: service.scale - primaries,
            storage_class,
            ..ClusterSpec::default()
        })
    }
}

#[async_trait]
impl AddonOperator for MysqlOperator {
    type Resource = MysqlCluster;

    fn kind(&self) -> AddonKind {
        AddonKind::Mysql
    }

    async fn is_supported(&self) -> Capability {
        self.api.supports(MYSQL_API_VERSION, MYSQL_RESOURCE).await
    }

    fn validate(&self, sg: &ServiceGroup) -> Result<()> {
        require_operator(sg, AddonKind::Mysql)?;
        require_exact_services(sg, &[MYSQL_SERVICE])?;
        topology::resolve(&self.cluster_spec(sg)?).map(|_| ())
    }

    fn convert(&self, sg: &ServiceGroup) -> Result<MysqlCluster> {
        let cluster = self.cluster_spec(sg)?;
        let solos = topology::resolve(&cluster)?;
        let service = sg
            .service(MYSQL_SERVICE)
            .ok_or_else(|| WorkloadError::validation_error("缺少服务 mysql"))?;
        let root_password = service
            .env
            .get(ROOT_PASSWORD_ENV)
            .filter(|p| !p.is_empty())
            .cloned()
            .unwrap_or_else(|| self.passwords.generate());
        let capacity = service
            .volumes
            .first()
            .map(|v| v.capacity_gib)
            .filter(|c| *c > 0)
            .unwrap_or(10);

        Ok(MysqlCluster {
            api_version: MYSQL_API_VERSION.to_string(),
            kind: "Mysql".to_string(),
            metadata: ObjectMeta::new(MYSQL_SERVICE, sg.namespace()).with_labels(service.labels.clone()),
            spec: MysqlSpec {
                version: cluster.version.clone(),
                primary_mode: cluster.primary_mode,
                primaries: cluster.primaries,
                replicas: cluster.replicas,
                primary_id: cluster.primary_id,
                image: service.image.clone(),
                root_password,
                storage_class: cluster.storage_class.clone(),
                storage_size: format!("{capacity}Gi"),
                cpu_request: k8s_cpu_quantity(service.cpu),
                memory_request: k8s_memory_quantity(service.memory),
                solos,
                affinity: group_affinity(sg, &self.placement),
            },
            status: None,
        })
    }

    async fn create(&self, mysql: &MysqlCluster) -> Result<()> {
        let ns = &mysql.metadata.namespace;
        self.api.ensure_namespace(ns).await?;
        match self.api.create(&Self::cr_path(ns, None), mysql).await? {
            CreateOutcome::Created => info!(namespace = %ns, nodes = mysql.spec.solos.len(), "Mysql 已创建"),
            CreateOutcome::AlreadyExists => info!(namespace = %ns, "Mysql 已存在"),
        }
        Ok(())
    }

    async fn inspect(&self, sg: &ServiceGroup) -> Result<ServiceGroup> {
        let ns = sg.namespace();
        let mysql: MysqlCluster = self
            .api
            .get(&Self::cr_path(&ns, Some(MYSQL_SERVICE)))
            .await?
            .ok_or_else(|| WorkloadError::not_found(format!("{ns}/mysql")))?;
        let status = mysql.status.unwrap_or_default();

        let mut inspected = sg.clone();
        if let Some(service) = inspected.service_mut(MYSQL_SERVICE) {
            service.status = addon_health(&status.phase);
            service.vip = Some(
                status
                    .write_host
                    .unwrap_or_else(|| service_domain(&format!("{MYSQL_SERVICE}-write"), &ns)),
            );
        }
        inspected.refresh_status();
        Ok(inspected)
    }

    async fn remove(&self, sg: &ServiceGroup) -> Result<()> {
        let ns = sg.namespace();
        if !self.api.delete(&Self::cr_path(&ns, Some(MYSQL_SERVICE))).await? {
            warn!(namespace = %ns, "Mysql 不存在，继续删除 namespace");
        }
        self.api.delete_namespace(&ns).await
    }

    async fn update(&self, mysql: &MysqlCluster) -> Result<()> {
        let ns = &mysql.metadata.namespace;
        let path = Self::cr_path(ns, Some(&mysql.metadata.name));
        let current: LiveMysql = self
            .api
            .get(&path)
            .await?
            .ok_or_else(|| WorkloadError::not_found(format!("{ns}/{}", mysql.metadata.name)))?;
        if current.spec.replicas > 0 && mysql.spec.replicas == 0 {
            return Err(WorkloadError::validation_error(format!(
                "{ns}: 从节点数量不能从 {} 缩到 0",
                current.spec.replicas
            )));
        }

        let mut next = mysql.clone();
        next.metadata.resource_version = current.metadata.resource_version;
        // 已有集群沿用原密码
        if !current.spec.root_password.is_empty() {
            next.spec.root_password = current.spec.root_password;
        }
        self.api.replace(&path, &next).await?;
        info!(namespace = %ns, replicas = next.spec.replicas, "Mysql 已更新");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use workload_core::{HttpConfig, Service};
    use workload_infrastructure::ReqwestHttpClient;

    use super::*;
    use crate::operator::LABEL_USE_OPERATOR;

    fn operator() -> MysqlOperator {
        let http = ReqwestHttpClient::new(&HttpConfig::default()).unwrap();
        let api = K8sApi::new(Arc::new(http), "http://127.0.0.1:1");
        MysqlOperator::new(api, &AddonConfig::default(), PlacementConfig::default())
            .with_passwords(PasswordGenerator::from_seed(42))
    }

    fn group(scale: u32) -> ServiceGroup {
        ServiceGroup {
            id: "m1".to_string(),
            kind: "addon-mysql".to_string(),
            labels: BTreeMap::from([(LABEL_USE_OPERATOR.to_string(), "mysql".to_string())]),
            services: vec![Service {
                name: "mysql".to_string(),
                image: "registry/mysql:5.7".to_string(),
                scale,
                cpu: 1.0,
                memory: 2048.0,
                ..Service::default()
            }],
            ..ServiceGroup::default()
        }
    }

    #[test]
    fn test_convert_resolves_topology() {
        let mysql = operator().convert(&group(3)).unwrap();
        assert_eq!(mysql.metadata.namespace, "addon-mysql--m1");
        assert_eq!(mysql.spec.replicas, 2);
        assert_eq!(mysql.spec.solos.len(), 3);
        assert_eq!(mysql.spec.solos[0].source_id, -1);
        assert_eq!(mysql.spec.root_password.len(), 16);
        assert_eq!(mysql.spec.memory_request, "2048Mi");
    }

    #[test]
    fn test_convert_keeps_supplied_password() {
        let mut sg = group(1);
        sg.services[0]
            .env
            .insert(ROOT_PASSWORD_ENV.to_string(), "s3cret".to_string());
        assert_eq!(operator().convert(&sg).unwrap().spec.root_password, "s3cret");
    }

    #[test]
    fn test_validate() {
        let op = operator();
        assert!(op.validate(&group(2)).is_ok());

        let mut bad_mode = group(2);
        bad_mode
            .labels
            .insert(PRIMARY_MODE_LABEL.to_string(), "ring".to_string());
        assert!(op.validate(&bad_mode).is_err());

        let mut unsupported = group(2);
        unsupported
            .labels
            .insert(crate::operator::LABEL_VERSION.to_string(), "4.1".to_string());
        assert!(op.validate(&unsupported).is_err());

        let mut missing = group(1);
        missing.services.clear();
        assert!(op.validate(&missing).is_err());
    }
}
