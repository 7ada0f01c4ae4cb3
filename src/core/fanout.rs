//! 有上限的並行擷取。
//!
//! 每個任務在取得號誌許可後才開始執行，同時執行中的任務數不超過上限。
//! 任務失敗或 panic 只影響自己的結果；呼叫端一定會拿到與輸入數量相同的結果，
//! 順序為完成順序。

use crate::domain::model::{FetchOutcome, FetchTask, TaskFailure};
use crate::utils::error::{LocatorError, Result};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_CONCURRENCY_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct FanoutFetcher {
    semaphore: Arc<Semaphore>,
    limit: usize,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

/// 持有許可期間計入執行中數量，drop 時歸還
struct InFlightGuard {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

impl FanoutFetcher {
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(LocatorError::ConfigError {
                message: "Concurrency limit must be at least 1".to_string(),
            });
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// 曾觀察到的最大同時執行數
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    fn record_admission(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        let mut peak = self.peak_in_flight.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_in_flight.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }

    /// 執行所有任務並收集每個任務的結果
    pub async fn run<T, F, Fut>(&self, tasks: Vec<FetchTask<T>>, work: F) -> Vec<FetchOutcome<T>>
    where
        T: Clone + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<String>>> + Send + 'static,
    {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }

        tracing::info!(
            "🚀 Fetching {} targets with concurrency limit {}",
            total,
            self.limit
        );

        let (tx, mut rx) = mpsc::channel::<FetchOutcome<T>>(total);
        let work = Arc::new(work);
        let fetcher = self.clone();

        tokio::spawn(async move {
            let mut pending = tasks.into_iter();
            while let Some(task) = pending.next() {
                let permit = match fetcher.semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        let failure = TaskFailure {
                            reason: "concurrency limiter closed".to_string(),
                        };
                        for task in std::iter::once(task).chain(pending.by_ref()) {
                            let _ = tx
                                .send(FetchOutcome {
                                    task,
                                    result: Err(failure.clone()),
                                })
                                .await;
                        }
                        break;
                    }
                };

                fetcher.record_admission();
                let guard = InFlightGuard {
                    _permit: permit,
                    in_flight: fetcher.in_flight.clone(),
                };
                tracing::debug!("Admitted task {}", task.id);

                let tx = tx.clone();
                let work = work.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    let handle = tokio::spawn(work(task.target.clone()));
                    let result = match handle.await {
                        Ok(Ok(payload)) => Ok(payload),
                        Ok(Err(e)) => Err(TaskFailure {
                            reason: e.to_string(),
                        }),
                        Err(join_error) => Err(TaskFailure {
                            reason: if join_error.is_panic() {
                                "task panicked".to_string()
                            } else {
                                format!("task aborted: {}", join_error)
                            },
                        }),
                    };
                    let _ = tx.send(FetchOutcome { task, result }).await;
                });
            }
        });

        let mut outcomes = Vec::with_capacity(total);
        while outcomes.len() < total {
            match rx.recv().await {
                Some(outcome) => {
                    if let Some(failure) = outcome.failure() {
                        tracing::warn!("⚠️ Task {} failed: {}", outcome.task.id, failure);
                    }
                    outcomes.push(outcome);
                }
                None => break,
            }
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        tracing::info!(
            "✅ Fetch finished: {} succeeded, {} failed, peak concurrency {}",
            outcomes.len() - failed,
            failed,
            self.peak_in_flight()
        );
        outcomes
    }
}

/// 全部任務都失敗時回報錯誤；沒有任務時視為成功
pub fn require_any_success<T>(outcomes: &[FetchOutcome<T>]) -> Result<()> {
    if outcomes.is_empty() || outcomes.iter().any(FetchOutcome::is_success) {
        return Ok(());
    }
    let first_reason = outcomes
        .iter()
        .find_map(|o| o.failure().map(|f| f.reason.clone()))
        .unwrap_or_default();
    Err(LocatorError::AllTasksFailed {
        total: outcomes.len(),
        first_reason,
    })
}
