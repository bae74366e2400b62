use serde::{Deserialize, Serialize};

/// 不参与 any 通配调度的项目/工作空间
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub unlimited_projects: Vec<String>,
    pub unlimited_workspaces: Vec<String>,
}

impl PlacementConfig {
    pub fn is_empty(&self) -> bool {
        self.unlimited_projects.is_empty() && self.unlimited_workspaces.is_empty()
    }
}
