//! 调度约束编译
//!
//! 把任务标签描述的放置意图编译成后端可识别的约束：DC/OS 系的
//! `(attribute, operator, value)` 列表，或 Kubernetes 的节点亲和性。
//! 两种输出对同一个节点给出相同的接受/拒绝结论。

pub mod dcos;
pub mod k8s;
pub mod node;
pub mod policy;

pub use dcos::{Constraint, Operator};
pub use k8s::{NodeAffinity, NodeSelectorRequirement, NodeSelectorTerm, SelectorOperator};
pub use node::NodeProfile;
pub use policy::{PlacementPolicy, Requirement};

use std::collections::BTreeMap;

use workload_core::PlacementConfig;

/// 标签 → DC/OS 约束
pub fn compile_dcos(labels: &BTreeMap<String, String>, placement: &PlacementConfig) -> Vec<Constraint> {
    dcos::compile(&PlacementPolicy::from_labels(labels, placement))
}

/// 标签 → Kubernetes 节点亲和性
pub fn compile_k8s(labels: &BTreeMap<String, String>, placement: &PlacementConfig) -> NodeAffinity {
    k8s::compile(&PlacementPolicy::from_labels(labels, placement))
}
