//! 原始用户事实
//!
//! 由数据访问层按用户聚合提供，上下文构建器从中派生事实快照。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 用户原始字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserFacts {
    pub user_id: String,
    pub credits: f64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub is_blocked: bool,
    pub preferred_model: Option<String>,
    pub active_overlays: Vec<String>,
}

/// 购买聚合
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PurchaseSummary {
    pub completed_count: i64,
    pub latest_completed_at: Option<DateTime<Utc>>,
    pub latest_failed_at: Option<DateTime<Utc>>,
}

/// 生成记录聚合
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GenerationSummary {
    pub total_count: i64,
    pub latest_at: Option<DateTime<Utc>>,
}

/// 构建上下文所需的全部原始事实
#[derive(Debug, Clone, PartialEq)]
pub struct RawFacts {
    pub user: UserFacts,
    pub purchases: PurchaseSummary,
    pub generations: GenerationSummary,
}
