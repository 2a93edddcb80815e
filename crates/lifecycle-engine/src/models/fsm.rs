//! 状态机模型
//!
//! 状态与转换都归属于某个状态机版本，回放只在单一版本内进行。

use chrono::{DateTime, Utc};
use formula_engine::Condition;
use serde::{Deserialize, Serialize};

use super::action::ActionRecord;

/// 状态机状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FsmState {
    pub id: i64,
    pub name: String,
    pub version_id: i64,
    /// 每个版本应有且仅有一个初始状态（未在数据层强制）
    pub is_initial: bool,
    pub is_terminal: bool,
}

/// 触发器类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    /// 事件触发
    #[default]
    Event,
    /// 超时触发
    Time,
}

/// 回放时有专门推断规则的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    BotStart,
    PaymentCompleted,
    FirstGeneration,
    GenerationCompleted,
    UserBlocked,
    UserUnblocked,
}

impl LifecycleEvent {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "BOT_START" => Some(Self::BotStart),
            "PAYMENT_COMPLETED" => Some(Self::PaymentCompleted),
            "FIRST_GENERATION" => Some(Self::FirstGeneration),
            "GENERATION_COMPLETED" => Some(Self::GenerationCompleted),
            "USER_BLOCKED" => Some(Self::UserBlocked),
            "USER_UNBLOCKED" => Some(Self::UserUnblocked),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BotStart => "BOT_START",
            Self::PaymentCompleted => "PAYMENT_COMPLETED",
            Self::FirstGeneration => "FIRST_GENERATION",
            Self::GenerationCompleted => "GENERATION_COMPLETED",
            Self::UserBlocked => "USER_BLOCKED",
            Self::UserUnblocked => "USER_UNBLOCKED",
        }
    }
}

/// 状态转换
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsmTransition {
    pub id: i64,
    pub from_state_id: i64,
    pub to_state_id: i64,
    pub version_id: i64,
    pub trigger_type: TriggerType,
    pub trigger_event: Option<String>,
    pub timeout_minutes: Option<i32>,
    /// 数值越大越先匹配
    pub priority: i32,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// 按原样保存，下发时才解析
    #[serde(default)]
    pub actions: Vec<ActionRecord>,
}

impl FsmTransition {
    /// 已识别的触发事件
    pub fn lifecycle_event(&self) -> Option<LifecycleEvent> {
        self.trigger_event
            .as_deref()
            .and_then(LifecycleEvent::from_name)
    }
}

/// 按优先级降序、ID 升序排列候选转换
///
/// ID 作为同优先级时的稳定次序，避免依赖数据源返回顺序。
pub fn sort_candidates(transitions: &mut [FsmTransition]) {
    transitions.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
}

/// 用户在某版本中的当前状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserFsmState {
    pub user_id: String,
    pub state_id: i64,
    pub version_id: i64,
    pub entered_at: DateTime<Utc>,
}
