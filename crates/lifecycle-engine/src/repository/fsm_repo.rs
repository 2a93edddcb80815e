//! 状态机仓储
//!
//! 转换的条件与动作以 JSONB 存储。动作配置按原样读出，不在这里校验。

use async_trait::async_trait;
use formula_engine::Condition;
use sqlx::PgPool;
use sqlx::types::Json;

use super::traits::FsmRepositoryTrait;
use crate::models::{ActionRecord, FsmState, FsmTransition, TriggerType, UserFsmState};
use lifecycle_shared::error::Result;

/// 转换表的原始行
#[derive(Debug, sqlx::FromRow)]
struct TransitionRow {
    id: i64,
    from_state_id: i64,
    to_state_id: i64,
    version_id: i64,
    trigger_type: TriggerType,
    trigger_event: Option<String>,
    timeout_minutes: Option<i32>,
    priority: i32,
    conditions: Json<Vec<Condition>>,
    actions: Json<Vec<ActionRecord>>,
}

impl From<TransitionRow> for FsmTransition {
    fn from(row: TransitionRow) -> Self {
        let mut actions = row.actions.0;
        actions.sort_by_key(|a| a.order);

        Self {
            id: row.id,
            from_state_id: row.from_state_id,
            to_state_id: row.to_state_id,
            version_id: row.version_id,
            trigger_type: row.trigger_type,
            trigger_event: row.trigger_event,
            timeout_minutes: row.timeout_minutes,
            priority: row.priority,
            conditions: row.conditions.0,
            actions,
        }
    }
}

pub struct FsmRepository {
    pool: PgPool,
}

impl FsmRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 获取版本的初始状态
    ///
    /// 存在多个初始状态时取 ID 最小的一个。
    pub async fn get_initial_state(&self, version_id: i64) -> Result<Option<FsmState>> {
        let state = sqlx::query_as::<_, FsmState>(
            r#"
            SELECT id, name, version_id, is_initial, is_terminal
            FROM fsm_states
            WHERE version_id = $1 AND is_initial = TRUE
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(state)
    }

    pub async fn get_state(&self, id: i64) -> Result<Option<FsmState>> {
        let state = sqlx::query_as::<_, FsmState>(
            r#"
            SELECT id, name, version_id, is_initial, is_terminal
            FROM fsm_states
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(state)
    }

    /// 列出某状态在版本内的出向转换
    pub async fn list_transitions(
        &self,
        from_state_id: i64,
        version_id: i64,
    ) -> Result<Vec<FsmTransition>> {
        let rows = sqlx::query_as::<_, TransitionRow>(
            r#"
            SELECT id, from_state_id, to_state_id, version_id, trigger_type, trigger_event,
                   timeout_minutes, priority,
                   COALESCE(conditions, '[]'::jsonb) AS conditions,
                   COALESCE(actions, '[]'::jsonb) AS actions
            FROM fsm_transitions
            WHERE from_state_id = $1 AND version_id = $2
            ORDER BY priority DESC, id ASC
            "#,
        )
        .bind(from_state_id)
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FsmTransition::from).collect())
    }

    // ==================== 写入操作 ====================

    /// 写入或覆盖用户当前状态
    pub async fn upsert_user_state(&self, state: &UserFsmState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_fsm_states (user_id, state_id, version_id, entered_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET state_id = EXCLUDED.state_id,
                version_id = EXCLUDED.version_id,
                entered_at = EXCLUDED.entered_at
            "#,
        )
        .bind(&state.user_id)
        .bind(state.state_id)
        .bind(state.version_id)
        .bind(state.entered_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl FsmRepositoryTrait for FsmRepository {
    async fn get_initial_state(&self, version_id: i64) -> Result<Option<FsmState>> {
        self.get_initial_state(version_id).await
    }

    async fn get_state(&self, id: i64) -> Result<Option<FsmState>> {
        self.get_state(id).await
    }

    async fn list_transitions(&self, from_state_id: i64, version_id: i64) -> Result<Vec<FsmTransition>> {
        self.list_transitions(from_state_id, version_id).await
    }

    async fn upsert_user_state(&self, state: &UserFsmState) -> Result<()> {
        self.upsert_user_state(state).await
    }
}
