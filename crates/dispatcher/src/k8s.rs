use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::node::{group_marker, NodeProfile, K8S_LABEL_PREFIX};
use crate::policy::{PlacementPolicy, Requirement};

pub const FIELD_NODE_NAME: &str = "metadata.name";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl NodeSelectorRequirement {
    fn exists(key: String) -> Self {
        Self {
            key,
            operator: SelectorOperator::Exists,
            values: Vec::new(),
        }
    }

    fn does_not_exist(key: String) -> Self {
        Self {
            key,
            operator: SelectorOperator::DoesNotExist,
            values: Vec::new(),
        }
    }

    fn matches(&self, value: Option<&str>) -> bool {
        match self.operator {
            SelectorOperator::Exists => value.is_some(),
            SelectorOperator::DoesNotExist => value.is_none(),
            SelectorOperator::In => value.is_some_and(|v| self.values.iter().any(|x| x == v)),
            SelectorOperator::NotIn => !value.is_some_and(|v| self.values.iter().any(|x| x == v)),
        }
    }
}

/// 一个 term 内的表达式是 AND 关系
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelectorTerm {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<NodeSelectorRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_fields: Vec<NodeSelectorRequirement>,
}

impl NodeSelectorTerm {
    pub fn accepts(&self, node: &NodeProfile) -> bool {
        let labels = node.k8s_labels();
        self.match_expressions
            .iter()
            .all(|r| r.matches(labels.get(&r.key).map(String::as_str)))
            && self.match_fields.iter().all(|r| {
                let field = (r.key == FIELD_NODE_NAME).then_some(node.hostname.as_str());
                r.matches(field)
            })
    }
}

/// term 之间是 OR 关系
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelector {
    pub node_selector_terms: Vec<NodeSelectorTerm>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAffinity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_during_scheduling_ignored_during_execution: Option<NodeSelector>,
}

impl NodeAffinity {
    pub fn terms(&self) -> &[NodeSelectorTerm] {
        self.required_during_scheduling_ignored_during_execution
            .as_ref()
            .map(|s| s.node_selector_terms.as_slice())
            .unwrap_or_default()
    }

    /// 没有 term 时不限制；否则任一 term 满足即可
    pub fn accepts(&self, node: &NodeProfile) -> bool {
        let terms = self.terms();
        terms.is_empty() || terms.iter().any(|t| t.accepts(node))
    }

    /// 所有 term 共有的 `Exists` 要求，折叠为 nodeSelector
    ///
    /// 只认 affinity 不认 nodeSelector 的场景（spark-submit）会丢掉其余约束。
    pub fn common_node_selector(&self) -> BTreeMap<String, String> {
        let terms = self.terms();
        let Some((first, rest)) = terms.split_first() else {
            return BTreeMap::new();
        };
        first
            .match_expressions
            .iter()
            .filter(|r| r.operator == SelectorOperator::Exists)
            .filter(|r| rest.iter().all(|t| t.match_expressions.contains(r)))
            .map(|r| (r.key.clone(), "true".to_string()))
            .collect()
    }
}

fn tag_key(tag: &str) -> String {
    format!("{K8S_LABEL_PREFIX}{tag}")
}

/// 前缀要求只对 project-/workspace- 分组可表达
fn prefix_key(prefix: &str) -> Option<String> {
    group_marker(&format!("{prefix}x"))
}

/// 编译为 Kubernetes 节点亲和性
///
/// `AnyOf` 会把 term 按笛卡尔积展开。无法表达的前缀要求被丢弃并打印告警。
pub fn compile(policy: &PlacementPolicy) -> NodeAffinity {
    let mut terms = vec![NodeSelectorTerm::default()];

    for requirement in policy.requirements() {
        match requirement {
            Requirement::HasTag(tag) => push_all(&mut terms, NodeSelectorRequirement::exists(tag_key(&tag))),
            Requirement::LacksTag(tag) => {
                push_all(&mut terms, NodeSelectorRequirement::does_not_exist(tag_key(&tag)))
            }
            Requirement::HasTagPrefix(prefix) => match prefix_key(&prefix) {
                Some(key) => push_all(&mut terms, NodeSelectorRequirement::exists(key)),
                None => warn!(prefix = %prefix, "Kubernetes 无法表达标签前缀约束，已忽略"),
            },
            Requirement::LacksTagPrefix(prefix) => match prefix_key(&prefix) {
                Some(key) => push_all(&mut terms, NodeSelectorRequirement::does_not_exist(key)),
                None => warn!(prefix = %prefix, "Kubernetes 无法表达标签前缀约束，已忽略"),
            },
            Requirement::AnyOf(tags) => {
                terms = terms
                    .iter()
                    .flat_map(|term| {
                        tags.iter().map(move |tag| {
                            let mut t = term.clone();
                            t.match_expressions
                                .push(NodeSelectorRequirement::exists(tag_key(tag)));
                            t
                        })
                    })
                    .collect();
            }
            Requirement::HostIn(hosts) => {
                for term in terms.iter_mut() {
                    term.match_fields.push(NodeSelectorRequirement {
                        key: FIELD_NODE_NAME.to_string(),
                        operator: SelectorOperator::In,
                        values: hosts.clone(),
                    });
                }
            }
        }
    }

    terms.retain(|t| !t.match_expressions.is_empty() || !t.match_fields.is_empty());
    if terms.is_empty() {
        return NodeAffinity::default();
    }
    NodeAffinity {
        required_during_scheduling_ignored_during_execution: Some(NodeSelector {
            node_selector_terms: terms,
        }),
    }
}

fn push_all(terms: &mut [NodeSelectorTerm], requirement: NodeSelectorRequirement) {
    for term in terms.iter_mut() {
        term.match_expressions.push(requirement.clone());
    }
}
