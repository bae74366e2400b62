use std::fmt;

use serde::{Deserialize, Serialize};

/// 后端类型标识（Metronome、Spark、Flink ...）
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kind(String);

impl Kind {
    pub const METRONOME: &'static str = "METRONOME";
    pub const SPARK: &'static str = "SPARK";
    pub const FLINK: &'static str = "FLINK";
    pub const K8S_SPARK: &'static str = "K8SSPARK";
    pub const K8S_FLINK: &'static str = "K8SFLINK";

    pub fn new<S: Into<String>>(kind: S) -> Self {
        Self(kind.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_k8s(&self) -> bool {
        self.0.starts_with("K8S")
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Kind {
    fn from(value: &str) -> Self {
        Kind::new(value)
    }
}

/// 某个 Kind 下一个具体的集群/后端实例名
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}
