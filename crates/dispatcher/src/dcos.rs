use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::node::NodeProfile;
use crate::policy::{PlacementPolicy, Requirement};

/// 节点标签所在的 Mesos 属性
pub const DCOS_ATTRIBUTE: &str = "dice_tags";
pub const HOSTNAME_ATTRIBUTE: &str = "hostname";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    Like,
    Unlike,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Like => "LIKE",
            Operator::Unlike => "UNLIKE",
        }
    }
}

/// Metronome/Marathon 放置约束 `(attribute, operator, value)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub attribute: String,
    pub operator: Operator,
    pub value: String,
}

impl Constraint {
    fn tags(operator: Operator, value: String) -> Self {
        Self {
            attribute: DCOS_ATTRIBUTE.to_string(),
            operator,
            value,
        }
    }

    /// Marathon 风格的三元组
    pub fn as_triple(&self) -> [String; 3] {
        [
            self.attribute.clone(),
            self.operator.as_str().to_string(),
            self.value.clone(),
        ]
    }

    /// 按 Mesos 语义判断：LIKE 要求属性值整体匹配正则，UNLIKE 相反
    pub fn accepts(&self, node: &NodeProfile) -> bool {
        let value = match self.attribute.as_str() {
            HOSTNAME_ATTRIBUTE => node.hostname.clone(),
            _ => node.dcos_attribute(),
        };
        let re = match Regex::new(&format!("^(?:{})$", self.value)) {
            Ok(re) => re,
            Err(e) => {
                warn!(pattern = %self.value, error = %e, "约束正则非法，视为不满足");
                return false;
            }
        };
        match self.operator {
            Operator::Like => re.is_match(&value),
            Operator::Unlike => !re.is_match(&value),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.attribute, self.operator.as_str(), self.value)
    }
}

/// 以逗号为边界匹配整个标签，`any-gpu` 不算 `any`
fn word(tag: &str) -> String {
    format!("(?:.*,)?{tag}(?:,.*)?")
}

fn prefix_word(prefix: &str) -> String {
    format!("(?:.*,)?{prefix}[^,]+(?:,.*)?")
}

fn any_of(tags: &[String]) -> String {
    tags.iter().map(|t| word(t)).collect::<Vec<_>>().join("|")
}

/// 编译为 DC/OS 约束列表
///
/// 输出只由标签决定，同样的输入总是得到逐字节相同的结果。
pub fn compile(policy: &PlacementPolicy) -> Vec<Constraint> {
    policy
        .requirements()
        .iter()
        .map(|requirement| match requirement {
            Requirement::HasTag(tag) => Constraint::tags(Operator::Like, word(tag)),
            Requirement::LacksTag(tag) => Constraint::tags(Operator::Unlike, word(tag)),
            Requirement::HasTagPrefix(prefix) => {
                Constraint::tags(Operator::Like, prefix_word(prefix))
            }
            Requirement::LacksTagPrefix(prefix) => {
                Constraint::tags(Operator::Unlike, prefix_word(prefix))
            }
            Requirement::AnyOf(tags) => Constraint::tags(Operator::Like, any_of(tags)),
            Requirement::HostIn(hosts) => Constraint {
                attribute: HOSTNAME_ATTRIBUTE.to_string(),
                operator: Operator::Like,
                value: hosts.join("|"),
            },
        })
        .collect()
}

/// 所有约束都满足才接受
pub fn accepts(constraints: &[Constraint], node: &NodeProfile) -> bool {
    constraints.iter().all(|c| c.accepts(node))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use workload_core::PlacementConfig;

    use super::*;
    use crate::policy::*;

    fn compile_labels(pairs: &[(&str, &str)], placement: &PlacementConfig) -> Vec<Constraint> {
        let labels: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        compile(&PlacementPolicy::from_labels(&labels, placement))
    }

    #[test]
    fn test_default_is_like_any_without_platform() {
        let constraints = compile_labels(&[], &PlacementConfig::default());
        assert_eq!(constraints.len(), 2);
        assert_eq!(
            constraints[0].as_triple(),
            ["dice_tags".to_string(), "LIKE".to_string(), "(?:.*,)?any(?:,.*)?".to_string()]
        );
        assert_eq!(constraints[1].to_string(), "dice_tags UNLIKE (?:.*,)?platform(?:,.*)?");
        assert!(accepts(&constraints, &NodeProfile::new("n1", ["any"])));
        assert!(!accepts(&constraints, &NodeProfile::new("n1", ["any", "platform"])));
    }

    #[test]
    fn test_tags_match_whole_entries_only() {
        let constraints = compile_labels(&[(LABEL_EXCLUDE_TAGS, "gpu")], &PlacementConfig::default());
        assert!(!accepts(&constraints, &NodeProfile::new("n1", ["any-gpu"])));
        assert!(!accepts(&constraints, &NodeProfile::new("n1", ["many"])));
        assert!(accepts(&constraints, &NodeProfile::new("n1", ["any", "gpu-old"])));
        assert!(accepts(&constraints, &NodeProfile::new("n1", ["alpha", "any", "beta"])));

        let prefixed = compile_labels(
            &[(LABEL_EXCLUDE_PREFIX_TAGS, "org-")],
            &PlacementConfig::default(),
        );
        assert!(accepts(&prefixed, &NodeProfile::new("n1", ["any", "my-org-1"])));
        assert!(!accepts(&prefixed, &NodeProfile::new("n1", ["any", "org-1"])));
    }

    #[test]
    fn test_wire_format() {
        let constraints = compile_labels(
            &[
                (LABEL_MATCH_TAGS, "pack"),
                (LABEL_EXCLUDE_TAGS, "gpu"),
                (LABEL_EXCLUDE_PREFIX_TAGS, "org-"),
                (LABEL_INCLUSIVE_TAGS, "a,b"),
                (LABEL_SPECIFIC_HOSTS, "10.0.0.1,10.0.0.2"),
            ],
            &PlacementConfig::default(),
        );
        let values: Vec<String> = constraints.iter().map(ToString::to_string).collect();
        assert_eq!(
            values,
            vec![
                "dice_tags LIKE (?:.*,)?any(?:,.*)?|(?:.*,)?pack(?:,.*)?",
                "dice_tags UNLIKE (?:.*,)?platform(?:,.*)?",
                "dice_tags UNLIKE (?:.*,)?gpu(?:,.*)?",
                "dice_tags UNLIKE (?:.*,)?org-[^,]+(?:,.*)?",
                "dice_tags LIKE (?:.*,)?a(?:,.*)?|(?:.*,)?b(?:,.*)?",
                "hostname LIKE 10.0.0.1|10.0.0.2",
            ]
        );
        let json = serde_json::to_value(&constraints[2]).unwrap();
        assert_eq!(json["operator"], "UNLIKE");
        assert_eq!(json["attribute"], "dice_tags");
    }

    #[test]
    fn test_compile_is_deterministic() {
        let pairs = [(LABEL_MATCH_TAGS, "x,y,bigdata"), (LABEL_PROJECT, "9")];
        let placement = PlacementConfig {
            unlimited_projects: vec!["1".into()],
            ..Default::default()
        };
        let a = serde_json::to_string(&compile_labels(&pairs, &placement)).unwrap();
        let b = serde_json::to_string(&compile_labels(&pairs, &placement)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_accepts() {
        let constraints = compile_labels(&[(LABEL_EXCLUDE_TAGS, "gpu")], &PlacementConfig::default());
        assert!(accepts(&constraints, &NodeProfile::new("n1", ["any", "pack"])));
        assert!(!accepts(&constraints, &NodeProfile::new("n1", ["any", "gpu"])));
        assert!(!accepts(&constraints, &NodeProfile::new("n1", ["pack"])));
    }
}
