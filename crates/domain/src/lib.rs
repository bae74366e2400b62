//! 纯逻辑层：状态规范化与任务描述转换，不做任何 I/O。

pub mod status;
pub mod transform;

pub use status::{can_transition, normalize, NativeSource};
pub use transform::Platform;
