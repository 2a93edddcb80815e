//! 批量回放
//!
//! 按 user_id 键集分页遍历全部用户，页内以有限并发逐个回放。
//! 单个用户失败只计数并记录日志，分页查询失败则中止整个批次。

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

use crate::immersion::{ImmersionEngine, ImmersionOutcome};
use crate::repository::FactsRepositoryTrait;
use crate::timeout::with_timeout;
use lifecycle_shared::config::LifecycleConfig;
use lifecycle_shared::error::Result;

/// 批量回放统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    pub processed: u64,
    /// 已写入状态的用户
    pub persisted: u64,
    /// 用户或初始状态缺失而跳过
    pub skipped: u64,
    pub failed: u64,
}

impl BackfillSummary {
    fn record(&mut self, user_id: &str, result: Result<ImmersionOutcome>) {
        self.processed += 1;
        match result {
            Ok(ImmersionOutcome::Completed(report)) if report.persisted => self.persisted += 1,
            Ok(_) => self.skipped += 1,
            Err(e) => {
                self.failed += 1;
                warn!(user_id, error = %e, "用户回放失败");
            }
        }
    }
}

/// 批量回放执行器
pub struct BackfillRunner {
    engine: ImmersionEngine,
    facts: Arc<dyn FactsRepositoryTrait>,
    concurrency: usize,
    page_size: i64,
    step_timeout: Duration,
}

impl BackfillRunner {
    pub fn new(
        engine: ImmersionEngine,
        facts: Arc<dyn FactsRepositoryTrait>,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            engine,
            facts,
            concurrency: config.backfill_concurrency.max(1),
            page_size: config.backfill_page_size.max(1),
            step_timeout: config.step_timeout(),
        }
    }

    /// 回放全部用户到指定版本
    pub async fn run(&self, version_id: i64) -> Result<BackfillSummary> {
        self.run_at(version_id, Utc::now()).await
    }

    /// 以同一时间点回放全部用户
    #[instrument(skip(self, now))]
    pub async fn run_at(&self, version_id: i64, now: DateTime<Utc>) -> Result<BackfillSummary> {
        let start = Instant::now();
        let mut summary = BackfillSummary::default();
        let mut after: Option<String> = None;

        loop {
            let user_ids = with_timeout(
                "list_user_ids",
                self.step_timeout,
                self.facts.list_user_ids(after.clone(), self.page_size),
            )
            .await?;

            let Some(last) = user_ids.last().cloned() else {
                break;
            };
            let page_len = user_ids.len();

            let engine = &self.engine;
            let results: Vec<_> = stream::iter(user_ids)
                .map(|user_id| async move {
                    let result = engine.immerse_at(&user_id, version_id, now).await;
                    (user_id, result)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

            for (user_id, result) in results {
                summary.record(&user_id, result);
            }

            info!(
                page_size = page_len,
                processed = summary.processed,
                failed = summary.failed,
                "批量回放进度"
            );

            if (page_len as i64) < self.page_size {
                break;
            }
            after = Some(last);
        }

        info!(
            processed = summary.processed,
            persisted = summary.persisted,
            skipped = summary.skipped,
            failed = summary.failed,
            duration_secs = start.elapsed().as_secs_f64(),
            "批量回放完成"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FsmState, GenerationSummary, PurchaseSummary, UserFacts};
    use crate::repository::{MockFactsRepositoryTrait, MockFsmRepositoryTrait};
    use chrono::TimeZone;
    use lifecycle_shared::error::LifecycleError;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
    }

    fn user(id: &str) -> UserFacts {
        UserFacts {
            user_id: id.to_string(),
            credits: 0.0,
            tags: vec![],
            created_at: now(),
            last_active_at: None,
            is_blocked: false,
            preferred_model: None,
            active_overlays: vec![],
        }
    }

    fn config() -> LifecycleConfig {
        LifecycleConfig {
            backfill_page_size: 2,
            backfill_concurrency: 2,
            ..Default::default()
        }
    }

    fn runner(facts: MockFactsRepositoryTrait, fsm: MockFsmRepositoryTrait) -> BackfillRunner {
        let facts: Arc<dyn FactsRepositoryTrait> = Arc::new(facts);
        let engine = ImmersionEngine::new(Arc::clone(&facts), Arc::new(fsm), &config());
        BackfillRunner::new(engine, facts, &config())
    }

    #[tokio::test]
    async fn test_pages_through_all_users() {
        let mut facts = MockFactsRepositoryTrait::new();
        facts.expect_list_user_ids().returning(|after, limit| {
            assert_eq!(limit, 2);
            Ok(match after.as_deref() {
                None => vec!["a".to_string(), "b".to_string()],
                Some("b") => vec!["c".to_string(), "ghost".to_string()],
                Some("ghost") => vec![],
                Some(other) => panic!("unexpected cursor: {other}"),
            })
        });
        facts.expect_get_user().returning(|id| {
            if id == "ghost" {
                Ok(None)
            } else if id == "c" {
                Err(LifecycleError::Internal("connection reset".to_string()))
            } else {
                Ok(Some(user(id)))
            }
        });
        facts
            .expect_get_purchase_summary()
            .returning(|_| Ok(PurchaseSummary::default()));
        facts
            .expect_get_generation_summary()
            .returning(|_| Ok(GenerationSummary::default()));

        let mut fsm = MockFsmRepositoryTrait::new();
        fsm.expect_get_initial_state().returning(|version_id| {
            Ok(Some(FsmState {
                id: 1,
                name: "NEW".to_string(),
                version_id,
                is_initial: true,
                is_terminal: true,
            }))
        });
        fsm.expect_upsert_user_state().times(2).returning(|_| Ok(()));

        let summary = runner(facts, fsm).run_at(4, now()).await.unwrap();
        assert_eq!(
            summary,
            BackfillSummary {
                processed: 4,
                persisted: 2,
                skipped: 1,
                failed: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_short_page_ends_the_run() {
        let mut facts = MockFactsRepositoryTrait::new();
        facts
            .expect_list_user_ids()
            .times(1)
            .returning(|_, _| Ok(vec!["a".to_string()]));
        facts.expect_get_user().returning(|_| Ok(None));

        let summary = runner(facts, MockFsmRepositoryTrait::new())
            .run_at(1, now())
            .await
            .unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts() {
        let mut facts = MockFactsRepositoryTrait::new();
        facts
            .expect_list_user_ids()
            .returning(|_, _| Err(LifecycleError::Internal("boom".to_string())));

        let err = runner(facts, MockFsmRepositoryTrait::new())
            .run_at(1, now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
