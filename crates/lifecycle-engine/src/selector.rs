//! 转换选择器
//!
//! 状态机的单步推进：按优先级遍历候选转换，先判断其触发器在历史事实下
//! 是否"可能已经发生"，再对条件求值，返回第一条两者都满足的转换。

use formula_engine::ConditionEvaluator;
use tracing::debug;

use crate::context::Context;
use crate::models::{FsmState, FsmTransition, LifecycleEvent, TriggerType};

/// 触发推断所需的原始标志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerFlags {
    pub is_blocked: bool,
}

/// 转换选择器
#[derive(Debug, Clone)]
pub struct TransitionSelector {
    /// USER_UNBLOCKED 只能从该状态离开
    blocked_state_name: String,
}

impl TransitionSelector {
    pub fn new(blocked_state_name: impl Into<String>) -> Self {
        Self {
            blocked_state_name: blocked_state_name.into(),
        }
    }

    /// 触发器在历史事实下是否可推断为已发生
    pub fn is_trigger_implied(
        &self,
        transition: &FsmTransition,
        current: &FsmState,
        ctx: &Context,
        flags: TriggerFlags,
    ) -> bool {
        // 超时触发没有可推断的实时事件
        if transition.trigger_type == TriggerType::Time {
            return false;
        }

        match transition.lifecycle_event() {
            Some(LifecycleEvent::BotStart) => true,
            Some(LifecycleEvent::PaymentCompleted) => ctx.total_payments > 0,
            Some(LifecycleEvent::FirstGeneration | LifecycleEvent::GenerationCompleted) => {
                ctx.total_generations > 0
            }
            Some(LifecycleEvent::UserBlocked) => flags.is_blocked,
            Some(LifecycleEvent::UserUnblocked) => {
                !flags.is_blocked && current.name == self.blocked_state_name
            }
            // 未识别的事件（或无事件名）只有带条件时才交给条件判断
            None => !transition.conditions.is_empty(),
        }
    }

    /// 选出下一条转换；`candidates` 须已按优先级排好序
    pub fn select<'a>(
        &self,
        current: &FsmState,
        candidates: &'a [FsmTransition],
        ctx: &Context,
        flags: TriggerFlags,
    ) -> Option<&'a FsmTransition> {
        for transition in candidates {
            if !self.is_trigger_implied(transition, current, ctx, flags) {
                continue;
            }

            let evaluation = ConditionEvaluator::evaluate_detailed(&transition.conditions, ctx);
            if evaluation.matched {
                debug!(
                    state_id = current.id,
                    transition_id = transition.id,
                    matched_group = ?evaluation.matched_group,
                    "转换命中"
                );
                return Some(transition);
            }
        }

        None
    }
}
