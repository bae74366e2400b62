use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::status::HealthStatus;

/// 多服务工作负载的抽象描述，由调用方持有，addon operator 消费
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceGroup {
    pub id: String,
    /// 类型前缀，例如 `addon-mysql`，与 id 一起组成 Kubernetes namespace
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub status: HealthStatus,
}

impl ServiceGroup {
    pub fn namespace(&self) -> String {
        format!("{}--{}", self.kind, self.id)
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn service_mut(&mut self, name: &str) -> Option<&mut Service> {
        self.services.iter_mut().find(|s| s.name == name)
    }

    /// 所有服务健康时服务组才健康
    pub fn refresh_status(&mut self) {
        let healthy = !self.services.is_empty()
            && self.services.iter().all(|s| s.status == HealthStatus::Healthy);
        self.status = HealthStatus::from_ready(healthy);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default = "default_scale")]
    pub scale: u32,
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub memory: f64,
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub volumes: Vec<ServiceVolume>,
    #[serde(default)]
    pub status: HealthStatus,
    #[serde(default)]
    pub vip: Option<String>,
}

fn default_scale() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceVolume {
    pub container_path: String,
    #[serde(default)]
    pub capacity_gib: u32,
    #[serde(default)]
    pub storage_class: Option<String>,
}
