//! 用户事实仓储
//!
//! 只读访问用户、购买与生成记录，聚合在 SQL 中完成。

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::FactsRepositoryTrait;
use crate::models::{GenerationSummary, PurchaseSummary, UserFacts};
use lifecycle_shared::error::Result;

pub struct FactsRepository {
    pool: PgPool,
}

impl FactsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 获取用户原始字段
    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserFacts>> {
        let user = sqlx::query_as::<_, UserFacts>(
            r#"
            SELECT user_id, credits::float8 AS credits, tags, created_at, last_active_at,
                   is_blocked, preferred_model, active_overlays
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// 购买聚合：成功次数、最近一次成功与失败的时间
    pub async fn get_purchase_summary(&self, user_id: &str) -> Result<PurchaseSummary> {
        let summary = sqlx::query_as::<_, PurchaseSummary>(
            r#"
            SELECT COUNT(*) FILTER (WHERE status = 'COMPLETED') AS completed_count,
                   MAX(created_at) FILTER (WHERE status = 'COMPLETED') AS latest_completed_at,
                   MAX(created_at) FILTER (WHERE status = 'FAILED') AS latest_failed_at
            FROM purchases
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }

    /// 生成记录聚合
    pub async fn get_generation_summary(&self, user_id: &str) -> Result<GenerationSummary> {
        let summary = sqlx::query_as::<_, GenerationSummary>(
            r#"
            SELECT COUNT(*) AS total_count, MAX(created_at) AS latest_at
            FROM generations
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }

    /// 键集分页列出用户 ID
    pub async fn list_user_ids(&self, after: Option<String>, limit: i64) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT user_id
            FROM users
            WHERE $1::text IS NULL OR user_id > $1
            ORDER BY user_id ASC
            LIMIT $2
            "#,
        )
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[async_trait]
impl FactsRepositoryTrait for FactsRepository {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserFacts>> {
        self.get_user(user_id).await
    }

    async fn get_purchase_summary(&self, user_id: &str) -> Result<PurchaseSummary> {
        self.get_purchase_summary(user_id).await
    }

    async fn get_generation_summary(&self, user_id: &str) -> Result<GenerationSummary> {
        self.get_generation_summary(user_id).await
    }

    async fn list_user_ids(&self, after: Option<String>, limit: i64) -> Result<Vec<String>> {
        self.list_user_ids(after, limit).await
    }
}
