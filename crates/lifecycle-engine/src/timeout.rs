//! 数据访问超时
//!
//! 回放中每一次外部读写都有独立的时间上限，超时视为该次回放失败。

use std::future::Future;
use std::time::Duration;

use lifecycle_shared::error::{LifecycleError, Result};

/// 在时间上限内等待 `fut` 完成
pub async fn with_timeout<T, F>(operation: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(LifecycleError::Timeout {
            operation: operation.to_string(),
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}
