//! # 数据模型
//!
//! 工作负载执行层在调用方（流水线引擎）与各后端之间传递的数据结构。
//!
//! ## 核心模型
//!
//! ### TaskSpec - 任务描述
//! 与后端无关的任务描述：镜像、命令、资源、环境变量、卷、标签。
//! 每次提交时由调用方构造，本层不持久化。
//!
//! ### StatusDesc - 规范化状态
//! 各后端原生状态映射后的统一状态，附带诊断信息。
//!
//! ### ServiceGroup - 服务组
//! 有状态中间件（MySQL/Redis/DaemonSet）的抽象描述，由 addon operator 消费。
//!
//! ## 状态流转
//!
//! ```text
//! Created → Unschedulable → Running → StoppedOnOK
//!                                   → StoppedOnFailed
//!                                   → StoppedByKilled
//! (任意轮询点) → Unknown | NotFoundInCluster
//! ```

pub mod kind;
pub mod service_group;
pub mod status;
pub mod task;

pub use kind::*;
pub use service_group::*;
pub use status::*;
pub use task::*;
