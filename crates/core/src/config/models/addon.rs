use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AddonConfig {
    /// Kubernetes API server 地址
    pub k8s_address: String,
    pub remove_timeout_seconds: u64,
    pub poll_interval_ms: u64,
    pub mysql_version: String,
    pub storage_class: String,
}

impl Default for AddonConfig {
    fn default() -> Self {
        Self {
            k8s_address: "http://127.0.0.1:8001".to_string(),
            remove_timeout_seconds: 120,
            poll_interval_ms: 2_000,
            mysql_version: "5.7".to_string(),
            storage_class: "dice-local-volume".to_string(),
        }
    }
}

impl AddonConfig {
    pub fn remove_timeout(&self) -> Duration {
        Duration::from_secs(self.remove_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.k8s_address.trim().is_empty() {
            return Err(anyhow::anyhow!("Kubernetes地址不能为空"));
        }
        if self.remove_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("删除超时时间必须大于0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("轮询间隔必须大于0"));
        }
        Ok(())
    }
}
