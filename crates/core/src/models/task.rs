use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::kind::Kind;
use crate::errors::{Result, WorkloadError};

/// 任务描述
///
/// 与后端无关的任务描述，每次提交时由调用方构造。`name` 由稳定的任务
/// 标识派生，重复提交同一个任务会得到同一个后端作业名，从而保证幂等。
///
/// # 字段说明
///
/// - `task_id`: 稳定的任务标识
/// - `cluster_name`: 目标集群，不能为空
/// - `cpu`: CPU 核数
/// - `memory`: 内存（MiB）
/// - `labels`: 元数据，同时也是调度策略的输入
/// - `handle`: 创建成功后后端返回的句柄，由调用方保存并在后续调用中传回
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_id: String,
    pub namespace: String,
    pub name: String,
    pub kind: Kind,
    pub cluster_name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub cpu: f64,
    pub memory: f64,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub binds: Vec<Bind>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    #[serde(default)]
    pub bigdata: Option<BigdataConf>,
    #[serde(default)]
    pub handle: Option<BackendHandle>,
}

impl TaskSpec {
    pub fn builder<S: Into<String>>(task_id: S, kind: Kind) -> TaskSpecBuilder {
        TaskSpecBuilder::new(task_id, kind)
    }

    /// Metronome 风格的作业 id：`{namespace}.{name}`
    pub fn job_name(&self) -> String {
        sanitize(&format!("{}.{}", self.namespace, self.name), true)
    }

    /// 满足 DNS-1123 的 Kubernetes 资源名
    pub fn k8s_name(&self) -> String {
        let mut name = sanitize(&self.name, false);
        name.truncate(63);
        name.trim_end_matches('-').to_string()
    }

    pub fn k8s_namespace(&self) -> String {
        let mut ns = sanitize(&self.namespace, false);
        ns.truncate(63);
        ns.trim_end_matches('-').to_string()
    }

    pub fn with_handle(mut self, handle: BackendHandle) -> Self {
        self.handle = Some(handle);
        self
    }
}

fn sanitize(raw: &str, keep_dots: bool) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            '.' if keep_dots => c,
            _ => '-',
        })
        .collect()
}

/// 由稳定任务标识派生的默认名称
pub fn derive_task_name(task_id: &str) -> String {
    sanitize(&format!("pipeline-task-{task_id}"), false)
}

pub struct TaskSpecBuilder {
    spec: TaskSpec,
}

impl TaskSpecBuilder {
    pub fn new<S: Into<String>>(task_id: S, kind: Kind) -> Self {
        let task_id = task_id.into();
        Self {
            spec: TaskSpec {
                name: derive_task_name(&task_id),
                task_id,
                namespace: "pipeline".to_string(),
                kind,
                cluster_name: String::new(),
                image: String::new(),
                cmd: String::new(),
                args: Vec::new(),
                cpu: 0.1,
                memory: 128.0,
                env: BTreeMap::new(),
                labels: BTreeMap::new(),
                binds: Vec::new(),
                volumes: Vec::new(),
                bigdata: None,
                handle: None,
            },
        }
    }

    pub fn namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.spec.namespace = namespace.into();
        self
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.spec.name = name.into();
        self
    }

    pub fn cluster<S: Into<String>>(mut self, cluster_name: S) -> Self {
        self.spec.cluster_name = cluster_name.into();
        self
    }

    pub fn image<S: Into<String>>(mut self, image: S) -> Self {
        self.spec.image = image.into();
        self
    }

    pub fn cmd<S: Into<String>>(mut self, cmd: S) -> Self {
        self.spec.cmd = cmd.into();
        self
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.spec.args = args;
        self
    }

    pub fn resources(mut self, cpu: f64, memory: f64) -> Self {
        self.spec.cpu = cpu;
        self.spec.memory = memory;
        self
    }

    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.spec.env.insert(key.into(), value.into());
        self
    }

    pub fn label<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.spec.labels.insert(key.into(), value.into());
        self
    }

    pub fn bind(mut self, bind: Bind) -> Self {
        self.spec.binds.push(bind);
        self
    }

    pub fn volume(mut self, volume: VolumeSpec) -> Self {
        self.spec.volumes.push(volume);
        self
    }

    pub fn bigdata(mut self, bigdata: BigdataConf) -> Self {
        self.spec.bigdata = Some(bigdata);
        self
    }

    pub fn build(self) -> Result<TaskSpec> {
        let spec = self.spec;
        if spec.cluster_name.trim().is_empty() {
            return Err(WorkloadError::config_error(format!(
                "任务缺少集群名: {}/{}",
                spec.namespace, spec.name
            )));
        }
        if spec.task_id.trim().is_empty() {
            return Err(WorkloadError::config_error(format!(
                "任务缺少稳定标识: {}/{}",
                spec.namespace, spec.name
            )));
        }
        if spec.cpu < 0.0 || spec.memory < 0.0 {
            return Err(WorkloadError::config_error(format!(
                "任务资源不能为负数: {}/{}, cpu={}, memory={}",
                spec.namespace, spec.name, spec.cpu, spec.memory
            )));
        }
        Ok(spec)
    }
}

/// 宿主机目录挂载
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bind {
    pub host_path: String,
    pub container_path: String,
    #[serde(default)]
    pub read_only: bool,
}

impl Bind {
    pub fn new<H: Into<String>, C: Into<String>>(host_path: H, container_path: C, read_only: bool) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only,
        }
    }
}

/// 命名卷
///
/// `id` 为空表示尚未在后端创建。`optional` 的卷在未创建时直接跳过。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub container_path: String,
    pub storage: String,
    #[serde(default)]
    pub optional: bool,
}

impl VolumeSpec {
    pub fn new<P: Into<String>, S: Into<String>>(container_path: P, storage: S) -> Self {
        Self {
            id: None,
            container_path: container_path.into(),
            storage: storage.into(),
            optional: false,
        }
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// 大数据作业参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigdataConf {
    /// jar / 制品路径
    pub resource: String,
    pub main_class: String,
    #[serde(default)]
    pub main_args: Vec<String>,
    #[serde(default)]
    pub spark: Option<SparkResources>,
    #[serde(default)]
    pub flink: Option<FlinkResources>,
}

impl BigdataConf {
    pub fn new<R: Into<String>, M: Into<String>>(resource: R, main_class: M, main_args: Vec<String>) -> Self {
        Self {
            resource: resource.into(),
            main_class: main_class.into(),
            main_args,
            spark: None,
            flink: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparkResources {
    pub spark_version: String,
    pub driver_cores: f64,
    pub driver_memory_mib: u64,
    pub executor_cores: f64,
    pub executor_memory_mib: u64,
    pub executor_instances: u32,
    pub properties: BTreeMap<String, String>,
}

impl Default for SparkResources {
    fn default() -> Self {
        Self {
            spark_version: "2.4.0".to_string(),
            driver_cores: 1.0,
            driver_memory_mib: 1024,
            executor_cores: 1.0,
            executor_memory_mib: 1024,
            executor_instances: 1,
            properties: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlinkResources {
    pub flink_version: String,
    pub parallelism: u32,
    pub job_manager_memory_mib: u64,
    pub task_manager_memory_mib: u64,
    pub task_slots: u32,
}

impl Default for FlinkResources {
    fn default() -> Self {
        Self {
            flink_version: "v1_17".to_string(),
            parallelism: 1,
            job_manager_memory_mib: 1024,
            task_manager_memory_mib: 1024,
            task_slots: 1,
        }
    }
}

/// 后端返回的不透明句柄，调用方负责持久化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendHandle {
    Job { id: String },
    Submission { id: String },
    FlinkJob { jar_id: String, job_id: String },
    CustomResource { namespace: String, name: String },
}
