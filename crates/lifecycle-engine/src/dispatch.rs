//! 动作下发边界
//!
//! 真实事件驱动转换时，核心只负责把选中转换的动作按顺序交给外部下发方，
//! 投递、记账与重试都属于下发方。回放引擎不会经过这里。
//! 动作配置在这里才解析，无法解析的动作记为失败，不交给下发方。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::models::{ActionKind, FsmTransition};
use lifecycle_shared::observability::metrics::record_dispatch;

/// 无法解析的动作在指标中的类型标签
const INVALID_ACTION_LABEL: &str = "INVALID";

/// 单个动作的下发结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// 外部动作下发方
///
/// 失败以 `success: false` 返回而不是错误，调用方不会重试。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn dispatch(&self, user_id: &str, action: &ActionKind) -> DispatchOutcome;
}

/// 一个动作的下发记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchedAction {
    pub action_type: String,
    pub order: i32,
    pub outcome: DispatchOutcome,
}

/// 一条转换的下发汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub transition_id: i64,
    pub actions: Vec<DispatchedAction>,
}

impl DispatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.actions.iter().all(|a| a.outcome.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &DispatchedAction> {
        self.actions.iter().filter(|a| !a.outcome.success)
    }
}

/// 转换动作的交接
#[derive(Clone)]
pub struct ActionHandoff {
    dispatcher: Arc<dyn ActionDispatcher>,
}

impl ActionHandoff {
    pub fn new(dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// 按 order 升序下发转换的全部动作
    ///
    /// `NO_ACTION` 不会交给下发方；某个动作失败不影响后续动作。
    #[instrument(skip(self, transition), fields(transition_id = transition.id))]
    pub async fn dispatch_transition(&self, user_id: &str, transition: &FsmTransition) -> DispatchReport {
        let mut ordered: Vec<_> = transition.actions.iter().collect();
        ordered.sort_by_key(|a| a.order);

        let mut actions = Vec::with_capacity(ordered.len());
        for record in ordered {
            let action = match record.to_action() {
                Ok(action) => action,
                Err(e) => {
                    warn!(
                        action_type = %record.action_type,
                        order = record.order,
                        error = %e,
                        "动作配置无效，跳过下发"
                    );
                    record_dispatch(INVALID_ACTION_LABEL, false);
                    actions.push(DispatchedAction {
                        action_type: record.action_type.clone(),
                        order: record.order,
                        outcome: DispatchOutcome::failure(e.to_string()),
                    });
                    continue;
                }
            };

            if action.kind == ActionKind::NoAction {
                continue;
            }

            let action_type = action.kind.action_type();
            let outcome = self.dispatcher.dispatch(user_id, &action.kind).await;
            record_dispatch(action_type, outcome.success);

            if !outcome.success {
                warn!(
                    action_type,
                    order = action.order,
                    error = outcome.error.as_deref().unwrap_or_default(),
                    "动作下发失败"
                );
            }

            actions.push(DispatchedAction {
                action_type: action_type.to_string(),
                order: action.order,
                outcome,
            });
        }

        let report = DispatchReport {
            transition_id: transition.id,
            actions,
        };
        info!(
            dispatched = report.actions.len(),
            failed = report.failures().count(),
            "转换动作已交接"
        );
        report
    }
}
