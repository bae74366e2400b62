//! 标签 → 调度策略
//!
//! 任务标签里的保留键描述了节点选择意图。这里把它们解析成一个
//! [`PlacementPolicy`]，再展开成后端无关的 [`Requirement`] 列表，
//! DC/OS 与 Kubernetes 两个编译器都只消费这个列表，从而保证语义一致。

use std::collections::{BTreeMap, BTreeSet};

use workload_core::PlacementConfig;

pub const LABEL_PROJECT: &str = "DICE_PROJECT";
pub const LABEL_WORKSPACE: &str = "DICE_WORKSPACE";
pub const LABEL_MATCH_TAGS: &str = "MATCH_TAGS";
pub const LABEL_EXCLUDE_TAGS: &str = "EXCLUDE_TAGS";
pub const LABEL_INCLUDE_PREFIX_TAGS: &str = "INCLUDE_PREFIX_TAGS";
pub const LABEL_EXCLUDE_PREFIX_TAGS: &str = "EXCLUDE_PREFIX_TAGS";
pub const LABEL_EXCLUSIVE_TAGS: &str = "EXCLUSIVE_TAGS";
pub const LABEL_INCLUSIVE_TAGS: &str = "INCLUSIVE_TAGS";
pub const LABEL_SPECIFIC_HOSTS: &str = "SPECIFIC_HOSTS";
pub const LABEL_ANY_ENABLED: &str = "ANY_TAG_ENABLED";
pub const LABEL_PLATFORM: &str = "DICE_PLATFORM";
pub const LABEL_UNLOCKED: &str = "DICE_UNLOCKED";
pub const LABEL_JOB_KIND: &str = "JOB_KIND";

pub const TAG_ANY: &str = "any";
pub const TAG_BIGDATA: &str = "bigdata";
pub const TAG_PLATFORM: &str = "platform";
pub const TAG_LOCKED: &str = "locked";
pub const PROJECT_PREFIX: &str = "project-";
pub const WORKSPACE_PREFIX: &str = "workspace-";

/// 有 Kubernetes 标记标签的分组前缀
pub const GROUP_PREFIXES: [&str; 2] = [PROJECT_PREFIX, WORKSPACE_PREFIX];

/// 单条调度要求，所有要求之间是 AND 关系
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    HasTag(String),
    LacksTag(String),
    /// 存在以该前缀开头（且更长）的标签
    HasTagPrefix(String),
    LacksTagPrefix(String),
    /// 至少拥有其中一个标签
    AnyOf(Vec<String>),
    /// 主机名在列表中
    HostIn(Vec<String>),
}

/// 解析后的调度意图
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementPolicy {
    pub project: Option<String>,
    pub workspace: Option<String>,
    /// 项目在不受限集合中，需要钉到项目专属节点
    pub project_pinned: bool,
    pub workspace_pinned: bool,
    /// 需要排斥所有项目专属节点
    pub repel_projects: bool,
    pub repel_workspaces: bool,
    pub any_enabled: bool,
    pub platform: bool,
    pub unlocked: bool,
    pub match_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub include_prefixes: Vec<String>,
    pub exclude_prefixes: Vec<String>,
    pub exclusive_tags: Vec<String>,
    pub inclusive_tags: Vec<String>,
    pub hosts: Vec<String>,
}

impl PlacementPolicy {
    pub fn from_labels(labels: &BTreeMap<String, String>, placement: &PlacementConfig) -> Self {
        let get = |key: &str| labels.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let project = get(LABEL_PROJECT).map(str::to_string);
        let workspace = get(LABEL_WORKSPACE).map(|w| w.to_lowercase());

        let (project_pinned, repel_projects) =
            group_decision(project.as_deref(), &placement.unlimited_projects);
        let (workspace_pinned, repel_workspaces) =
            group_decision(workspace.as_deref(), &placement.unlimited_workspaces);

        let mut match_tags = split_tags(get(LABEL_MATCH_TAGS));
        if get(LABEL_JOB_KIND) == Some(TAG_BIGDATA) && !match_tags.iter().any(|t| t == TAG_BIGDATA) {
            match_tags.push(TAG_BIGDATA.to_string());
        }

        Self {
            project,
            workspace,
            project_pinned,
            workspace_pinned,
            repel_projects,
            repel_workspaces,
            any_enabled: get(LABEL_ANY_ENABLED).map(parse_flag).unwrap_or(true),
            platform: get(LABEL_PLATFORM).map(parse_flag).unwrap_or(false),
            unlocked: get(LABEL_UNLOCKED).map(parse_flag).unwrap_or(false),
            match_tags,
            exclude_tags: split_tags(get(LABEL_EXCLUDE_TAGS)),
            include_prefixes: split_tags(get(LABEL_INCLUDE_PREFIX_TAGS)),
            exclude_prefixes: split_tags(get(LABEL_EXCLUDE_PREFIX_TAGS)),
            exclusive_tags: split_tags(get(LABEL_EXCLUSIVE_TAGS)),
            inclusive_tags: split_tags(get(LABEL_INCLUSIVE_TAGS)),
            hosts: split_tags(get(LABEL_SPECIFIC_HOSTS)),
        }
    }

    /// 钉到项目或工作空间专属节点后，不能再落到 any 通用资源上
    pub fn any_defeated(&self) -> bool {
        self.project_pinned || self.workspace_pinned
    }

    /// 展开成有序的要求列表，顺序稳定
    pub fn requirements(&self) -> Vec<Requirement> {
        let mut out = Vec::new();

        if self.platform {
            out.push(Requirement::HasTag(TAG_PLATFORM.to_string()));
        }
        if self.unlocked {
            out.push(Requirement::LacksTag(TAG_LOCKED.to_string()));
        }

        match (&self.project, self.project_pinned) {
            (Some(project), true) => out.push(Requirement::HasTag(project_tag(project))),
            _ if self.repel_projects => {
                out.push(Requirement::LacksTagPrefix(PROJECT_PREFIX.to_string()))
            }
            _ => {}
        }
        match (&self.workspace, self.workspace_pinned) {
            (Some(workspace), true) => out.push(Requirement::HasTag(workspace_tag(workspace))),
            _ if self.repel_workspaces => {
                out.push(Requirement::LacksTagPrefix(WORKSPACE_PREFIX.to_string()))
            }
            _ => {}
        }

        let wildcard = self.any_enabled && !self.any_defeated();
        if self.match_tags.is_empty() {
            if wildcard {
                out.push(Requirement::HasTag(TAG_ANY.to_string()));
            }
        } else {
            for tag in &self.match_tags {
                if wildcard && tag != TAG_BIGDATA && tag != TAG_ANY {
                    out.push(Requirement::AnyOf(vec![TAG_ANY.to_string(), tag.clone()]));
                } else {
                    out.push(Requirement::HasTag(tag.clone()));
                }
            }
        }

        if !self.platform {
            out.push(Requirement::LacksTag(TAG_PLATFORM.to_string()));
        }
        out.extend(self.exclude_tags.iter().cloned().map(Requirement::LacksTag));
        out.extend(self.exclude_prefixes.iter().cloned().map(Requirement::LacksTagPrefix));
        out.extend(self.include_prefixes.iter().cloned().map(Requirement::HasTagPrefix));
        out.extend(self.exclusive_tags.iter().cloned().map(Requirement::HasTag));
        if !self.inclusive_tags.is_empty() {
            out.push(Requirement::AnyOf(self.inclusive_tags.clone()));
        }
        if !self.hosts.is_empty() {
            out.push(Requirement::HostIn(self.hosts.clone()));
        }
        out
    }
}

/// 返回 (钉住, 排斥)
///
/// 不受限集合为空时既不钉住也不排斥。
fn group_decision(value: Option<&str>, unlimited: &[String]) -> (bool, bool) {
    if unlimited.is_empty() {
        return (false, false);
    }
    match value {
        Some(v) if unlimited.iter().any(|u| u == v) => (true, false),
        _ => (false, true),
    }
}

pub fn project_tag(project: &str) -> String {
    format!("{PROJECT_PREFIX}{project}")
}

pub fn workspace_tag(workspace: &str) -> String {
    format!("{WORKSPACE_PREFIX}{workspace}")
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// 逗号分隔的标签列表，去空去重并保持顺序
pub fn split_tags(raw: Option<&str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_split_tags() {
        assert_eq!(split_tags(Some(" a, b,,a ,c")), vec!["a", "b", "c"]);
        assert!(split_tags(None).is_empty());
    }

    #[test]
    fn test_empty_labels_only_require_any() {
        let policy = PlacementPolicy::from_labels(&BTreeMap::new(), &PlacementConfig::default());
        assert_eq!(
            policy.requirements(),
            vec![
                Requirement::HasTag("any".into()),
                Requirement::LacksTag("platform".into()),
            ]
        );
    }

    #[test]
    fn test_platform_nodes_reserved_for_platform_tasks() {
        let plain = PlacementPolicy::from_labels(&BTreeMap::new(), &PlacementConfig::default());
        assert!(plain
            .requirements()
            .contains(&Requirement::LacksTag("platform".into())));

        let platform = PlacementPolicy::from_labels(
            &labels(&[(LABEL_PLATFORM, "true")]),
            &PlacementConfig::default(),
        );
        let requirements = platform.requirements();
        assert_eq!(requirements[0], Requirement::HasTag("platform".into()));
        assert!(!requirements.contains(&Requirement::LacksTag("platform".into())));
    }

    #[test]
    fn test_pinned_project_defeats_any() {
        let placement = PlacementConfig {
            unlimited_projects: vec!["42".into()],
            ..Default::default()
        };
        let policy = PlacementPolicy::from_labels(
            &labels(&[(LABEL_PROJECT, "42"), (LABEL_MATCH_TAGS, "pack")]),
            &placement,
        );
        assert!(policy.any_defeated());
        assert_eq!(
            policy.requirements(),
            vec![
                Requirement::HasTag("project-42".into()),
                Requirement::HasTag("pack".into()),
                Requirement::LacksTag("platform".into()),
            ]
        );
    }

    #[test]
    fn test_unpinned_project_is_repelled() {
        let placement = PlacementConfig {
            unlimited_projects: vec!["42".into()],
            ..Default::default()
        };
        let policy =
            PlacementPolicy::from_labels(&labels(&[(LABEL_PROJECT, "7")]), &placement);
        assert_eq!(
            policy.requirements(),
            vec![
                Requirement::LacksTagPrefix("project-".into()),
                Requirement::HasTag("any".into()),
                Requirement::LacksTag("platform".into()),
            ]
        );
    }

    #[test]
    fn test_bigdata_never_joins_any() {
        let policy = PlacementPolicy::from_labels(
            &labels(&[(LABEL_MATCH_TAGS, "bigdata,pack")]),
            &PlacementConfig::default(),
        );
        assert_eq!(
            policy.requirements(),
            vec![
                Requirement::HasTag("bigdata".into()),
                Requirement::AnyOf(vec!["any".into(), "pack".into()]),
                Requirement::LacksTag("platform".into()),
            ]
        );

        let from_kind = PlacementPolicy::from_labels(
            &labels(&[(LABEL_JOB_KIND, "bigdata")]),
            &PlacementConfig::default(),
        );
        assert_eq!(from_kind.match_tags, vec!["bigdata"]);
    }

    #[test]
    fn test_disabled_wildcard_only_keeps_platform_exclusion() {
        let policy = PlacementPolicy::from_labels(
            &labels(&[(LABEL_ANY_ENABLED, "false")]),
            &PlacementConfig::default(),
        );
        assert_eq!(
            policy.requirements(),
            vec![Requirement::LacksTag("platform".into())]
        );
    }
}
