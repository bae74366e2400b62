//! Addon operator 生命周期
//!
//! 每种中间件实现同一个 [`AddonOperator`] 契约：
//! `validate → convert → create → inspect → remove / update`。
//! `convert` 只做纯转换，产出的资源类型由各 operator 自己定义，
//! `create`/`update` 只接受本 operator 的 `convert` 产物。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use workload_core::{Capability, PlacementConfig, Result, Service, ServiceGroup, WorkloadError};
use workload_dispatcher::{compile_k8s, NodeAffinity};
use workload_domain::transform::{k8s_cpu_quantity, k8s_memory_quantity};

/// 服务组标签：选择哪个 operator
pub const LABEL_USE_OPERATOR: &str = "USE_OPERATOR";
/// 服务组标签：中间件版本
pub const LABEL_VERSION: &str = "VERSION";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddonKind {
    Mysql,
    Redis,
    Elasticsearch,
    DaemonSet,
}

impl AddonKind {
    pub const ALL: [AddonKind; 4] = [
        AddonKind::Mysql,
        AddonKind::Redis,
        AddonKind::Elasticsearch,
        AddonKind::DaemonSet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AddonKind::Mysql => "mysql",
            AddonKind::Redis => "redis",
            AddonKind::Elasticsearch => "elasticsearch",
            AddonKind::DaemonSet => "daemonset",
        }
    }

    /// 从服务组的 `USE_OPERATOR` 标签解析
    pub fn of(sg: &ServiceGroup) -> Result<Self> {
        let raw = sg.labels.get(LABEL_USE_OPERATOR).ok_or_else(|| {
            WorkloadError::validation_error(format!(
                "服务组 {} 缺少标签 {LABEL_USE_OPERATOR}",
                sg.namespace()
            ))
        })?;
        raw.parse()
    }
}

impl FromStr for AddonKind {
    type Err = WorkloadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(AddonKind::Mysql),
            "redis" => Ok(AddonKind::Redis),
            "elasticsearch" => Ok(AddonKind::Elasticsearch),
            "daemonset" => Ok(AddonKind::DaemonSet),
            other => Err(WorkloadError::validation_error(format!(
                "不支持的 operator: {other}"
            ))),
        }
    }
}

impl fmt::Display for AddonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait AddonOperator: Send + Sync {
    /// `convert` 的产物
    type Resource: Send + Sync;

    fn kind(&self) -> AddonKind;

    /// 集群是否安装了本 operator 依赖的 CRD
    async fn is_supported(&self) -> Capability;

    /// 结构性前置检查，不修改服务组
    fn validate(&self, sg: &ServiceGroup) -> Result<()>;

    fn convert(&self, sg: &ServiceGroup) -> Result<Self::Resource>;

    async fn create(&self, resource: &Self::Resource) -> Result<()>;

    /// 读回后端状态，返回刷新了服务和服务组健康度的副本
    async fn inspect(&self, sg: &ServiceGroup) -> Result<ServiceGroup>;

    async fn remove(&self, sg: &ServiceGroup) -> Result<()>;

    async fn update(&self, resource: &Self::Resource) -> Result<()>;
}

/// 所有 operator 共用的对象元数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl ObjectMeta {
    pub fn new<N: Into<String>, S: Into<String>>(name: N, namespace: S) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }
}

/// 只读 resourceVersion 用
#[derive(Debug, Deserialize)]
pub(crate) struct Versioned {
    pub metadata: ObjectMeta,
}

/// 存放中间件密码的 Opaque Secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(rename = "type")]
    pub secret_type: String,
    pub string_data: BTreeMap<String, String>,
}

impl Secret {
    pub fn opaque(metadata: ObjectMeta, string_data: BTreeMap<String, String>) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "Secret".to_string(),
            metadata,
            secret_type: "Opaque".to_string(),
            string_data,
        }
    }
}

/// 容器 requests/limits，两者取相同值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub requests: BTreeMap<String, String>,
    pub limits: BTreeMap<String, String>,
}

impl Resources {
    pub fn of(service: &Service) -> Self {
        let quantities = BTreeMap::from([
            ("cpu".to_string(), k8s_cpu_quantity(service.cpu)),
            ("memory".to_string(), k8s_memory_quantity(service.memory)),
        ]);
        Self {
            requests: quantities.clone(),
            limits: quantities,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkloadStatus {
    #[serde(default)]
    ready_replicas: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkloadSpec {
    #[serde(default)]
    replicas: u32,
}

/// StatefulSet / Deployment 的副本就绪情况
#[derive(Debug, Deserialize)]
pub(crate) struct Workload {
    #[serde(default)]
    spec: WorkloadSpec,
    #[serde(default)]
    status: WorkloadStatus,
}

impl Workload {
    pub fn ready(&self) -> bool {
        self.spec.replicas > 0 && self.status.ready_replicas == self.spec.replicas
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affinity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_affinity: Option<NodeAffinity>,
}

/// 服务组标签编译出的节点亲和性
pub fn group_affinity(sg: &ServiceGroup, placement: &PlacementConfig) -> Affinity {
    let affinity = compile_k8s(&sg.labels, placement);
    Affinity {
        node_affinity: (!affinity.terms().is_empty()).then_some(affinity),
    }
}

/// 集群内的服务域名
pub fn service_domain(service: &str, namespace: &str) -> String {
    format!("{service}.{namespace}.svc.cluster.local")
}

pub(crate) fn require_operator(sg: &ServiceGroup, expected: AddonKind) -> Result<()> {
    let kind = AddonKind::of(sg)?;
    if kind != expected {
        return Err(WorkloadError::validation_error(format!(
            "服务组 {} 的 operator 是 {kind}，不是 {expected}",
            sg.namespace()
        )));
    }
    if sg.id.trim().is_empty() || sg.kind.trim().is_empty() {
        return Err(WorkloadError::validation_error("服务组 id 和 type 不能为空"));
    }
    Ok(())
}

/// 服务组必须恰好由 `names` 这些服务组成，不多不少
pub(crate) fn require_exact_services(sg: &ServiceGroup, names: &[&str]) -> Result<()> {
    for name in names {
        if sg.service(name).is_none() {
            return Err(WorkloadError::validation_error(format!(
                "服务组 {} 缺少服务 {name}",
                sg.namespace()
            )));
        }
    }
    if sg.services.len() != names.len() {
        let actual: Vec<&str> = sg.services.iter().map(|s| s.name.as_str()).collect();
        return Err(WorkloadError::validation_error(format!(
            "服务组 {} 应只包含服务 {names:?}，实际为 {actual:?}",
            sg.namespace()
        )));
    }
    Ok(())
}
