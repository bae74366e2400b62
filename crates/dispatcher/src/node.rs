use std::collections::{BTreeMap, BTreeSet};

use crate::policy::GROUP_PREFIXES;

/// Kubernetes 节点上标签的 key 前缀
pub const K8S_LABEL_PREFIX: &str = "dice/";

/// 一个候选节点：主机名加标签集合
///
/// DC/OS 上标签以逗号拼接放在 `dice_tags` 属性里，Kubernetes 上每个标签
/// 对应一个 `dice/<tag>=true` 的节点 label。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeProfile {
    pub hostname: String,
    pub tags: BTreeSet<String>,
}

impl NodeProfile {
    pub fn new<H: Into<String>, I, S>(hostname: H, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hostname: hostname.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// `dice_tags` 属性值
    pub fn dcos_attribute(&self) -> String {
        self.tags.iter().cloned().collect::<Vec<_>>().join(",")
    }

    /// 节点 label，分组标签（project-/workspace-）额外带一个分组标记
    pub fn k8s_labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        for tag in &self.tags {
            labels.insert(format!("{K8S_LABEL_PREFIX}{tag}"), "true".to_string());
            if let Some(marker) = group_marker(tag) {
                labels.insert(marker, "true".to_string());
            }
        }
        labels
    }
}

/// `project-42` → `dice/project`
pub fn group_marker(tag: &str) -> Option<String> {
    GROUP_PREFIXES.iter().find_map(|prefix| {
        (tag.len() > prefix.len() && tag.starts_with(prefix))
            .then(|| format!("{K8S_LABEL_PREFIX}{}", prefix.trim_end_matches('-')))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k8s_labels_include_group_marker() {
        let node = NodeProfile::new("node-1", ["any", "project-42"]);
        let labels = node.k8s_labels();
        assert_eq!(labels.get("dice/any").map(String::as_str), Some("true"));
        assert!(labels.contains_key("dice/project-42"));
        assert!(labels.contains_key("dice/project"));
        assert_eq!(node.dcos_attribute(), "any,project-42");
        assert_eq!(group_marker("project-"), None);
    }
}
