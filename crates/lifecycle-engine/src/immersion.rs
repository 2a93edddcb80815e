//! 状态回放引擎
//!
//! 从版本的初始状态出发，只根据用户的历史事实反复选择转换，推断出用户当前应处的状态，
//! 最后以 upsert 写入。回放过程中不执行任何动作，因此批量回放与版本迁移可以安全重跑。
//!
//! 终止条件：
//! - 到达终止状态
//! - 当前状态没有可选的转换
//! - 步数达到上限（环形转换图也能结束）

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::cache::TransitionCache;
use crate::context::ContextBuilder;
use crate::models::{FsmState, RawFacts, UserFsmState};
use crate::repository::{FactsRepositoryTrait, FsmRepositoryTrait};
use crate::selector::{TransitionSelector, TriggerFlags};
use crate::timeout::with_timeout;
use lifecycle_shared::config::LifecycleConfig;
use lifecycle_shared::error::{LifecycleError, Result};
use lifecycle_shared::observability::metrics::record_immersion;

/// 回放停止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    Terminal,
    NoMatch,
    DepthExhausted,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terminal => "terminal",
            Self::NoMatch => "no_match",
            Self::DepthExhausted => "depth_exhausted",
        }
    }
}

/// 回放经过的一步
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImmersionStep {
    pub transition_id: i64,
    pub from_state_id: i64,
    pub to_state_id: i64,
}

/// 回放结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImmersionReport {
    pub user_id: String,
    pub version_id: i64,
    pub final_state: FsmState,
    pub steps: u32,
    pub path: Vec<ImmersionStep>,
    pub stop_reason: StopReason,
    /// 预览模式下不写入
    pub persisted: bool,
}

/// 单个用户的回放结局
#[derive(Debug, Clone, PartialEq)]
pub enum ImmersionOutcome {
    Completed(ImmersionReport),
    /// 用户不存在，未写入
    UserNotFound,
    /// 版本没有初始状态，未写入
    NoInitialState,
}

impl ImmersionOutcome {
    pub fn report(&self) -> Option<&ImmersionReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }

    fn metric_label(&self) -> &'static str {
        match self {
            Self::Completed(report) => report.stop_reason.as_str(),
            Self::UserNotFound => "user_not_found",
            Self::NoInitialState => "no_initial_state",
        }
    }
}

/// 状态回放引擎
///
/// 不同用户的回放互不依赖，可以并发执行；共享的只有只读的状态机图缓存。
#[derive(Clone)]
pub struct ImmersionEngine {
    facts: Arc<dyn FactsRepositoryTrait>,
    fsm: Arc<dyn FsmRepositoryTrait>,
    cache: TransitionCache,
    builder: ContextBuilder,
    selector: TransitionSelector,
    max_depth: u32,
    step_timeout: Duration,
}

impl ImmersionEngine {
    pub fn new(
        facts: Arc<dyn FactsRepositoryTrait>,
        fsm: Arc<dyn FsmRepositoryTrait>,
        config: &LifecycleConfig,
    ) -> Self {
        let step_timeout = config.step_timeout();
        Self {
            cache: TransitionCache::new(Arc::clone(&fsm), step_timeout),
            facts,
            fsm,
            builder: ContextBuilder::new(config.low_balance_threshold),
            selector: TransitionSelector::new(config.blocked_state_name.clone()),
            max_depth: config.max_depth,
            step_timeout,
        }
    }

    pub fn cache(&self) -> &TransitionCache {
        &self.cache
    }

    /// 回放并写入用户当前状态
    pub async fn immerse(&self, user_id: &str, version_id: i64) -> Result<ImmersionOutcome> {
        self.immerse_at(user_id, version_id, Utc::now()).await
    }

    /// 以指定时间点回放并写入
    pub async fn immerse_at(
        &self,
        user_id: &str,
        version_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ImmersionOutcome> {
        self.run(user_id, version_id, now, true).await
    }

    /// 只回放不写入
    pub async fn preview_at(
        &self,
        user_id: &str,
        version_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ImmersionOutcome> {
        self.run(user_id, version_id, now, false).await
    }

    #[instrument(skip(self, now), fields(steps = tracing::field::Empty))]
    async fn run(
        &self,
        user_id: &str,
        version_id: i64,
        now: DateTime<Utc>,
        persist: bool,
    ) -> Result<ImmersionOutcome> {
        let start = Instant::now();
        let result = self.replay(user_id, version_id, now, persist).await;

        match &result {
            Ok(outcome) => {
                let steps = outcome.report().map(|r| r.steps).unwrap_or(0);
                tracing::Span::current().record("steps", steps);
                record_immersion(outcome.metric_label(), steps, start.elapsed());
            }
            Err(e) => {
                warn!(error = %e, code = e.code(), "回放失败");
                record_immersion("failed", 0, start.elapsed());
            }
        }

        result
    }

    async fn replay(
        &self,
        user_id: &str,
        version_id: i64,
        now: DateTime<Utc>,
        persist: bool,
    ) -> Result<ImmersionOutcome> {
        let Some(raw) = self.load_facts(user_id).await? else {
            info!("用户不存在，跳过回放");
            return Ok(ImmersionOutcome::UserNotFound);
        };

        let Some(initial) = self.cache.initial_state(version_id).await? else {
            warn!("版本没有初始状态，跳过回放");
            return Ok(ImmersionOutcome::NoInitialState);
        };

        // 整个回放使用同一时间点的事实
        let ctx = self.builder.build(&raw, now);
        let flags = TriggerFlags {
            is_blocked: raw.user.is_blocked,
        };

        let mut current = initial;
        let mut path = Vec::new();
        let mut steps = 0u32;

        let stop_reason = loop {
            if current.is_terminal {
                break StopReason::Terminal;
            }
            if steps >= self.max_depth {
                break StopReason::DepthExhausted;
            }

            let candidates = self.cache.transitions(current.id, version_id).await?;
            let Some(transition) = self.selector.select(&current, &candidates, &ctx, flags) else {
                break StopReason::NoMatch;
            };

            let next = self
                .cache
                .state(transition.to_state_id)
                .await?
                .ok_or_else(|| LifecycleError::not_found("FsmState", transition.to_state_id))?;

            debug!(
                depth = steps,
                transition_id = transition.id,
                from = %current.name,
                to = %next.name,
                "状态推进"
            );

            path.push(ImmersionStep {
                transition_id: transition.id,
                from_state_id: current.id,
                to_state_id: next.id,
            });
            current = next;
            steps += 1;
        };

        if persist {
            let state = UserFsmState {
                user_id: user_id.to_string(),
                state_id: current.id,
                version_id,
                entered_at: now,
            };
            with_timeout(
                "upsert_user_state",
                self.step_timeout,
                self.fsm.upsert_user_state(&state),
            )
            .await?;
        }

        info!(
            state_id = current.id,
            state = %current.name,
            steps,
            stop_reason = stop_reason.as_str(),
            persisted = persist,
            "回放完成"
        );

        Ok(ImmersionOutcome::Completed(ImmersionReport {
            user_id: user_id.to_string(),
            version_id,
            final_state: current,
            steps,
            path,
            stop_reason,
            persisted: persist,
        }))
    }

    /// 读取构建上下文所需的全部事实
    async fn load_facts(&self, user_id: &str) -> Result<Option<RawFacts>> {
        let limit = self.step_timeout;

        let Some(user) = with_timeout("get_user", limit, self.facts.get_user(user_id)).await? else {
            return Ok(None);
        };

        let (purchases, generations) = tokio::try_join!(
            with_timeout("get_purchase_summary", limit, self.facts.get_purchase_summary(user_id)),
            with_timeout(
                "get_generation_summary",
                limit,
                self.facts.get_generation_summary(user_id)
            ),
        )?;

        Ok(Some(RawFacts {
            user,
            purchases,
            generations,
        }))
    }
}
