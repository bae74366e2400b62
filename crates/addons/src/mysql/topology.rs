//! MySQL 复制拓扑解析
//!
//! 输入是集群级描述（主节点模式、主/从数量、默认端口）和零个或多个按 id
//! 指定的单节点覆盖项，输出是每个节点完整的配置。拓扑用按 id 下标的数组
//! 表示，每个节点只记录自己的上游 id（`-1` 表示没有上游）。
//!
//! 任意一个节点校验失败，整个拓扑都不接受。

use serde::{Deserialize, Serialize};
use tracing::debug;

use workload_core::{Result, WorkloadError};

pub const NO_SOURCE: i32 = -1;

pub const DEFAULT_PORT: u32 = 3306;
pub const DEFAULT_MYDIR_PORT: u32 = 33081;
pub const DEFAULT_GROUP_PORT: u32 = 33061;
pub const DEFAULT_EXPORTER_PORT: u32 = 9104;

/// 组复制最多 9 个成员
const MAX_GROUP_MEMBERS: u32 = 9;
/// 单个集群的节点总数上限（主 + 从）
pub const MAX_NODES: u32 = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimaryMode {
    /// 传统主从，1 个主或 2 个互为主备
    #[default]
    Classic,
    /// 单主组复制
    Single,
    /// 多主组复制
    Multi,
}

/// 集群级拓扑描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterSpec {
    pub name: String,
    pub version: String,
    pub primary_mode: PrimaryMode,
    pub primaries: u32,
    pub replicas: u32,
    /// Classic 模式下的主节点 id
    pub primary_id: u32,
    pub port: u32,
    pub mydir_port: u32,
    pub group_port: u32,
    pub exporter_port: u32,
    pub storage_class: String,
    pub solos: Vec<SoloOverride>,
}

impl Default for ClusterSpec {
    fn default() -> Self {
        Self {
            name: "mysql".to_string(),
            version: "5.7".to_string(),
            primary_mode: PrimaryMode::Classic,
            primaries: 1,
            replicas: 1,
            primary_id: 0,
            port: DEFAULT_PORT,
            mydir_port: DEFAULT_MYDIR_PORT,
            group_port: DEFAULT_GROUP_PORT,
            exporter_port: DEFAULT_EXPORTER_PORT,
            storage_class: "dice-local-volume".to_string(),
            solos: Vec::new(),
        }
    }
}

impl ClusterSpec {
    /// 节点总数；溢出时饱和，由 `resolve` 的上限检查拒绝
    pub fn total(&self) -> u32 {
        self.primaries.saturating_add(self.replicas)
    }

    /// 用解析结果作为覆盖项，得到一个完全钉死的描述
    pub fn pinned(&self, solos: &[SoloSpec]) -> ClusterSpec {
        ClusterSpec {
            solos: solos.iter().map(SoloOverride::from).collect(),
            ..self.clone()
        }
    }
}

/// 用户按 id 声明的单节点覆盖项
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoloOverride {
    pub id: i64,
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u32>,
    pub mydir_port: Option<u32>,
    pub group_port: Option<u32>,
    pub exporter_port: Option<u32>,
}

impl From<&SoloSpec> for SoloOverride {
    fn from(solo: &SoloSpec) -> Self {
        Self {
            id: solo.id as i64,
            name: Some(solo.name.clone()),
            host: Some(solo.host.clone()),
            port: Some(solo.port as u32),
            mydir_port: Some(solo.mydir_port as u32),
            group_port: Some(solo.group_port as u32),
            exporter_port: Some(solo.exporter_port as u32),
        }
    }
}

/// 解析后的单节点配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoloSpec {
    pub id: u32,
    pub source_id: i32,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub mydir_port: u16,
    pub group_port: u16,
    pub exporter_port: u16,
}

impl SoloSpec {
    pub fn source(&self) -> Option<u32> {
        u32::try_from(self.source_id).ok()
    }

    pub fn is_primary(&self) -> bool {
        self.source_id == NO_SOURCE
    }
}

/// 主版本对应的主机名长度上限
pub fn hostname_limit(version: &str) -> Result<usize> {
    let version = version.trim();
    if version.starts_with("5.") {
        Ok(60)
    } else if version.starts_with("8.") {
        Ok(255)
    } else {
        Err(WorkloadError::validation_error(format!(
            "不支持的 MySQL 版本: {version}"
        )))
    }
}

fn check_cluster(spec: &ClusterSpec) -> Result<()> {
    if spec.name.trim().is_empty() {
        return Err(WorkloadError::validation_error("MySQL 集群名不能为空"));
    }
    if spec.primaries == 0 {
        return Err(WorkloadError::validation_error("主节点数量至少为 1"));
    }
    match spec.primaries.checked_add(spec.replicas) {
        Some(total) if total <= MAX_NODES => {}
        _ => {
            return Err(WorkloadError::validation_error(format!(
                "节点总数超过上限 {MAX_NODES}: primaries={}, replicas={}",
                spec.primaries, spec.replicas
            )))
        }
    }
    match spec.primary_mode {
        PrimaryMode::Classic => {
            if spec.primaries > 2 {
                return Err(WorkloadError::validation_error(format!(
                    "Classic 模式主节点数量只能是 1 或 2: {}",
                    spec.primaries
                )));
            }
            if spec.primary_id >= spec.total() {
                return Err(WorkloadError::validation_error(format!(
                    "主节点 id 越界: {} (共 {} 个节点)",
                    spec.primary_id,
                    spec.total()
                )));
            }
        }
        PrimaryMode::Single => {
            if spec.primaries != 1 {
                return Err(WorkloadError::validation_error(format!(
                    "Single 模式主节点数量只能是 1: {}",
                    spec.primaries
                )));
            }
        }
        PrimaryMode::Multi => {
            if spec.primaries > MAX_GROUP_MEMBERS {
                return Err(WorkloadError::validation_error(format!(
                    "Multi 模式主节点数量不能超过 {MAX_GROUP_MEMBERS}: {}",
                    spec.primaries
                )));
            }
        }
    }
    Ok(())
}

/// 第 `id` 个节点的上游
pub fn source_id(spec: &ClusterSpec, id: u32) -> i32 {
    match spec.primary_mode {
        PrimaryMode::Classic => {
            let primary = spec.primary_id;
            let partner = (spec.primaries == 2).then(|| {
                if primary + 1 < spec.total() {
                    primary + 1
                } else {
                    primary - 1
                }
            });
            match partner {
                None if id == primary => NO_SOURCE,
                Some(partner) if id == primary => partner as i32,
                Some(partner) if id == partner => primary as i32,
                _ => {
                    let (low, high) = match partner {
                        Some(partner) => (primary.min(partner), primary.max(partner)),
                        None => (primary, primary),
                    };
                    if id > high {
                        id as i32 - 1
                    } else {
                        debug_assert!(id < low);
                        id as i32 + 1
                    }
                }
            }
        }
        PrimaryMode::Single | PrimaryMode::Multi => {
            if id < spec.primaries {
                NO_SOURCE
            } else {
                (id - spec.primaries) as i32
            }
        }
    }
}

fn find_override(spec: &ClusterSpec, id: u32) -> Result<Option<&SoloOverride>> {
    let mut found = spec.solos.iter().filter(|s| s.id == id as i64);
    let first = found.next();
    if found.next().is_some() {
        return Err(WorkloadError::validation_error(format!(
            "节点 {id} 存在多个覆盖配置"
        )));
    }
    Ok(first)
}

fn check_port(id: u32, name: &str, port: u32) -> Result<u16> {
    match u16::try_from(port) {
        Ok(p) if p >= 1 => Ok(p),
        _ => Err(WorkloadError::validation_error(format!(
            "节点 {id}: {name} 超出范围 [1, 65535]: {port}"
        ))),
    }
}

fn check_ports(id: u32, ports: &[(&str, u16); 4]) -> Result<()> {
    for (i, (a_name, a)) in ports.iter().enumerate() {
        for (b_name, b) in &ports[i + 1..] {
            if a == b {
                return Err(WorkloadError::validation_error(format!(
                    "节点 {id}: {a_name} 与 {b_name} 不能相同 ({a})"
                )));
            }
        }
    }
    Ok(())
}

fn valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn check_host(id: u32, host: &str, limit: usize) -> Result<()> {
    if host.contains(':') {
        return Err(WorkloadError::validation_error(format!(
            "节点 {id}: host 不能包含端口: {host}"
        )));
    }
    if !host.split('.').all(valid_label) {
        return Err(WorkloadError::validation_error(format!(
            "节点 {id}: host 格式错误: {host}"
        )));
    }
    if host.len() > limit {
        return Err(WorkloadError::validation_error(format!(
            "节点 {id}: host 长度 {} 超过上限 {limit}: {host}",
            host.len()
        )));
    }
    Ok(())
}

fn check_links(solos: &[SoloSpec]) -> Result<()> {
    let total = solos.len() as i32;
    for solo in solos {
        let source = solo.source_id;
        if source == solo.id as i32 || source < NO_SOURCE || source >= total {
            return Err(WorkloadError::validation_error(format!(
                "节点 {} 的上游非法: {source}",
                solo.id
            )));
        }
    }
    for (i, a) in solos.iter().enumerate() {
        if solos[i + 1..].iter().any(|b| b.host == a.host) {
            return Err(WorkloadError::validation_error(format!(
                "节点 {} 的 host 重复: {}",
                a.id, a.host
            )));
        }
    }
    Ok(())
}

/// 解析并校验完整拓扑
pub fn resolve(spec: &ClusterSpec) -> Result<Vec<SoloSpec>> {
    check_cluster(spec)?;
    let limit = hostname_limit(&spec.version)?;
    let total = spec.total();

    if let Some(stray) = spec.solos.iter().find(|s| s.id < 0 || s.id >= total as i64) {
        return Err(WorkloadError::validation_error(format!(
            "覆盖配置的节点 id 越界: {} (共 {total} 个节点)",
            stray.id
        )));
    }

    let mut solos = Vec::with_capacity(total as usize);
    for id in 0..total {
        let solo = find_override(spec, id)?;
        let pick = |field: Option<u32>, default: u32| field.unwrap_or(default);
        let port = check_port(id, "port", pick(solo.and_then(|s| s.port), spec.port))?;
        let mydir_port = check_port(id, "mydirPort", pick(solo.and_then(|s| s.mydir_port), spec.mydir_port))?;
        let group_port = check_port(id, "groupPort", pick(solo.and_then(|s| s.group_port), spec.group_port))?;
        let exporter_port = check_port(
            id,
            "exporterPort",
            pick(solo.and_then(|s| s.exporter_port), spec.exporter_port),
        )?;
        check_ports(
            id,
            &[
                ("port", port),
                ("mydirPort", mydir_port),
                ("groupPort", group_port),
                ("exporterPort", exporter_port),
            ],
        )?;

        let name = solo
            .and_then(|s| s.name.clone())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("{}-{id}", spec.name));
        let host = solo
            .and_then(|s| s.host.clone())
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| format!("{name}.{}", spec.name));
        check_host(id, &host, limit)?;

        solos.push(SoloSpec {
            id,
            source_id: source_id(spec, id),
            name,
            host,
            port,
            mydir_port,
            group_port,
            exporter_port,
        });
    }
    check_links(&solos)?;
    debug!(cluster = %spec.name, nodes = solos.len(), "MySQL 拓扑解析完成");
    Ok(solos)
}
