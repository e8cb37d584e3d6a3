//! 并发限流器
//!
//! 全批次共享的计数准入闸门：文档分析与情感分析的所有外部调用合计不超过 N 个在途。
//! 底层是 tokio 的 `Semaphore`（FIFO 排队，不会饿死），外加在途计数用于观测。

use crate::error::ServiceError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

#[derive(Debug)]
struct Gauge {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// 并发限流器，克隆后共享同一组名额
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    gauge: Arc<Gauge>,
    capacity: usize,
}

/// 已获得的名额，drop 即归还
///
/// 成功、失败、panic 和取消路径都会经过 drop，所以每次 acquire 恰好对应一次 release。
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
    gauge: Arc<Gauge>,
}

impl Drop for LimiterPermit {
    fn drop(&mut self) {
        self.gauge.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            gauge: Arc::new(Gauge {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
            capacity,
        }
    }

    /// 等待空闲名额
    pub async fn acquire(&self) -> Result<LimiterPermit, ServiceError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ServiceError::invalid_input("并发限流器已关闭"))?;

        let now = self.gauge.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.gauge.peak.fetch_max(now, Ordering::AcqRel);
        debug!("获得调用名额, 在途 {}/{}", now, self.capacity);

        Ok(LimiterPermit {
            _permit: permit,
            gauge: self.gauge.clone(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前空闲名额数
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.gauge.in_flight.load(Ordering::Acquire)
    }

    /// 运行以来同时在途的最大值
    pub fn peak_in_flight(&self) -> usize {
        self.gauge.peak.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::time::Duration;

    #[tokio::test]
    async fn test_never_exceeds_capacity() {
        let limiter = ConcurrencyLimiter::new(3);
        let current = Arc::new(AtomicUsize::new(0));
        let observed_max = Arc::new(AtomicUsize::new(0));

        let tasks = (0..20).map(|i| {
            let limiter = limiter.clone();
            let current = current.clone();
            let observed_max = observed_max.clone();
            async move {
                let _permit = limiter.acquire().await.unwrap();
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                observed_max.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5 + (i % 4))).await;
                current.fetch_sub(1, Ordering::SeqCst);
            }
        });
        join_all(tasks).await;

        assert!(observed_max.load(Ordering::SeqCst) <= 3);
        assert_eq!(limiter.peak_in_flight(), 3);
        assert_eq!(limiter.available(), 3);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_permit_released_when_task_aborted() {
        let limiter = ConcurrencyLimiter::new(1);

        let held = limiter.clone();
        let handle = tokio::spawn(async move {
            let _permit = held.acquire().await.unwrap();
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        // 让任务先拿到名额
        while limiter.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(limiter.available(), 0);

        handle.abort();
        let _ = handle.await;

        assert_eq!(limiter.available(), 1);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        assert_eq!(ConcurrencyLimiter::new(0).capacity(), 1);
    }
}
