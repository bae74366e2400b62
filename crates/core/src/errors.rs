use thiserror::Error;

/// 工作负载执行层错误类型定义
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// 配置错误，不重试，直接返回给调用方
    #[error("配置错误: {0}")]
    Configuration(String),

    /// 幂等冲突（已存在/已在运行），调用方应视为成功
    #[error("资源已存在: {0}")]
    Conflict(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("后端返回错误: status={status}, body={body}")]
    Backend { status: u16, body: String },

    #[error("网络错误: {0}")]
    Transport(String),

    #[error("校验失败: {0}")]
    Validation(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("执行器未找到: {0}")]
    ExecutorNotFound(String),

    #[error("执行器类型重复注册: {0}")]
    DuplicateKind(String),

    #[error("操作超时: {0}")]
    Timeout(String),

    #[error("后端不支持: {0}")]
    Unsupported(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, WorkloadError>;

impl WorkloadError {
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn backend<S: Into<String>>(status: u16, body: S) -> Self {
        Self::Backend {
            status,
            body: body.into(),
        }
    }
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// 配置类错误：上游的接线问题，重试没有意义
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WorkloadError::Configuration(_)
                | WorkloadError::DuplicateKind(_)
                | WorkloadError::Internal(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            WorkloadError::Transport(_) | WorkloadError::Timeout(_) => true,
            WorkloadError::Backend { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, WorkloadError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            WorkloadError::NotFound(_) => true,
            WorkloadError::Backend { status, .. } => *status == 404,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for WorkloadError {
    fn from(err: serde_json::Error) -> Self {
        WorkloadError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for WorkloadError {
    fn from(err: anyhow::Error) -> Self {
        WorkloadError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(WorkloadError::config_error("missing cluster").is_fatal());
        assert!(!WorkloadError::config_error("missing cluster").is_retryable());
        assert!(WorkloadError::backend(503, "unavailable").is_retryable());
        assert!(!WorkloadError::backend(400, "bad request").is_retryable());
        assert!(WorkloadError::backend(404, "").is_not_found());
        assert!(WorkloadError::transport("connection reset").is_retryable());
        assert!(WorkloadError::conflict("job exists").is_conflict());
        assert!(!WorkloadError::conflict("job exists").is_fatal());
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let converted: WorkloadError = err.into();
        assert!(matches!(converted, WorkloadError::Serialization(_)));
    }
}
