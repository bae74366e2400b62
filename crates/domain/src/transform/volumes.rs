use tracing::debug;
use workload_core::{Result, TaskSpec, VolumeSpec, WorkloadError};

/// 卷的存储类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Local,
    Nfs,
    /// 占位卷，没有真实挂载语义
    Fake,
    /// 仅用于缓存声明
    Cache,
}

impl StorageKind {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StorageKind::Local),
            "nfs" => Ok(StorageKind::Nfs),
            "fake" => Ok(StorageKind::Fake),
            "cache" => Ok(StorageKind::Cache),
            other => Err(WorkloadError::config_error(format!(
                "不支持的卷存储类型: {other}"
            ))),
        }
    }

    pub fn is_mountable(&self) -> bool {
        matches!(self, StorageKind::Local | StorageKind::Nfs)
    }

    pub fn storage_class(&self) -> Option<&'static str> {
        match self {
            StorageKind::Local => Some("dice-local-volume"),
            StorageKind::Nfs => Some("dice-nfs-volume"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSource {
    /// 已创建的卷
    Existing { id: String },
    /// 需要新建的卷（Kubernetes 上对应一个 PVC）
    Provision { id: String, storage_class: String },
}

/// 规划好的卷挂载
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedVolume {
    pub index: usize,
    pub name: String,
    pub container_path: String,
    pub source: VolumeSource,
}

impl PlannedVolume {
    pub fn id(&self) -> &str {
        match &self.source {
            VolumeSource::Existing { id } | VolumeSource::Provision { id, .. } => id,
        }
    }

    /// DC/OS 上卷的宿主机目录
    pub fn host_path(&self, mountpoint: &str) -> String {
        format!(
            "{}/devops/ci/pipelines/{}",
            mountpoint.trim_end_matches('/'),
            self.id()
        )
    }
}

/// 把任务的卷描述转换成统一的挂载计划
///
/// 占位卷与缓存卷直接跳过；标记为 optional 且尚无 id 的卷不出现在结果中；
/// 未知存储类型返回配置错误。
pub fn plan_volumes(spec: &TaskSpec) -> Result<Vec<PlannedVolume>> {
    let mut planned = Vec::new();
    for (index, volume) in spec.volumes.iter().enumerate() {
        let kind = StorageKind::parse(&volume.storage).map_err(|e| {
            WorkloadError::config_error(format!("{}/{}: {e}", spec.namespace, spec.name))
        })?;
        if !kind.is_mountable() {
            debug!(path = %volume.container_path, storage = %volume.storage, "跳过无挂载语义的卷");
            continue;
        }
        if let Some(source) = volume_source(spec, index, volume, kind) {
            planned.push(PlannedVolume {
                index,
                name: format!("vol-{index}"),
                container_path: volume.container_path.clone(),
                source,
            });
        }
    }
    Ok(planned)
}

fn volume_source(
    spec: &TaskSpec,
    index: usize,
    volume: &VolumeSpec,
    kind: StorageKind,
) -> Option<VolumeSource> {
    match volume.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => Some(VolumeSource::Existing { id: id.to_string() }),
        None if volume.optional => {
            debug!(path = %volume.container_path, "optional 卷尚未创建，跳过");
            None
        }
        None => Some(VolumeSource::Provision {
            id: format!("{}-{}-{index}", spec.k8s_namespace(), spec.k8s_name()),
            storage_class: kind.storage_class().unwrap_or_default().to_string(),
        }),
    }
}
