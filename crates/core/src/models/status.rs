use std::fmt;

use serde::{Deserialize, Serialize};

/// 规范化的任务状态
///
/// 各后端的原生状态都会被映射到这里的某一个值。`Created` 只存在于
/// 第一次联系后端之前，任何后端都不会上报该状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Created,
    Unschedulable,
    Running,
    #[serde(rename = "StoppedOnOK")]
    StoppedOnOk,
    StoppedOnFailed,
    StoppedByKilled,
    Unknown,
    NotFoundInCluster,
}

impl StatusCode {
    pub const ALL: [StatusCode; 8] = [
        StatusCode::Created,
        StatusCode::Unschedulable,
        StatusCode::Running,
        StatusCode::StoppedOnOk,
        StatusCode::StoppedOnFailed,
        StatusCode::StoppedByKilled,
        StatusCode::Unknown,
        StatusCode::NotFoundInCluster,
    ];

    /// 终态：后端不会再让任务离开这些状态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatusCode::StoppedOnOk | StatusCode::StoppedOnFailed | StatusCode::StoppedByKilled
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::StoppedOnOk)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Created => "Created",
            StatusCode::Unschedulable => "Unschedulable",
            StatusCode::Running => "Running",
            StatusCode::StoppedOnOk => "StoppedOnOK",
            StatusCode::StoppedOnFailed => "StoppedOnFailed",
            StatusCode::StoppedByKilled => "StoppedByKilled",
            StatusCode::Unknown => "Unknown",
            StatusCode::NotFoundInCluster => "NotFoundInCluster",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 返回给引擎的规范化状态描述，每次 Status 调用重新计算
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDesc {
    #[serde(rename = "Status")]
    pub status: StatusCode,
    #[serde(rename = "LastMessage", default)]
    pub last_message: String,
}

impl StatusDesc {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            last_message: String::new(),
        }
    }

    pub fn with_message<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            last_message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NotFoundInCluster)
    }
}

/// Addon 服务的健康状态，由 operator 计算后读取
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    #[default]
    UnHealthy,
}

impl HealthStatus {
    pub fn from_ready(ready: bool) -> Self {
        if ready {
            HealthStatus::Healthy
        } else {
            HealthStatus::UnHealthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_desc_wire_format() {
        let desc = StatusDesc::with_message(StatusCode::StoppedOnOk, "done");
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["Status"], "StoppedOnOK");
        assert_eq!(json["LastMessage"], "done");
    }

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<_> = StatusCode::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal.len(), 3);
        assert!(!StatusCode::NotFoundInCluster.is_terminal());
    }
}
