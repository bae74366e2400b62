use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub retry: RetryConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("HTTP超时时间必须大于0"));
        }
        self.retry.validate()
    }
}

/// 重试策略，由 HTTP 协作者执行，执行器本身不重复实现
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub retry_on_5xx: bool,
    pub retry_on_transport_error: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            retry_on_5xx: true,
            retry_on_transport_error: true,
        }
    }
}

impl RetryConfig {
    /// 不重试
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// 第 `attempt` 次重试前的等待时间（attempt 从 1 开始）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1) as i32;
        let delay = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exp);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("最大尝试次数必须大于0"));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(anyhow::anyhow!(
                "退避倍数不能小于1: {}",
                self.backoff_multiplier
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(anyhow::anyhow!("最大重试间隔不能小于基础间隔"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped() {
        let retry = RetryConfig {
            base_delay_ms: 100,
            max_delay_ms: 350,
            backoff_multiplier: 2.0,
            ..RetryConfig::default()
        };
        assert_eq!(retry.delay_for(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for(3), Duration::from_millis(350));
    }
}
