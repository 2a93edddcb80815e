//! 仓储 Trait 定义

use async_trait::async_trait;

use crate::models::{FsmState, FsmTransition, GenerationSummary, PurchaseSummary, UserFacts, UserFsmState};
use lifecycle_shared::error::Result;

/// 用户事实仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FactsRepositoryTrait: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserFacts>>;
    async fn get_purchase_summary(&self, user_id: &str) -> Result<PurchaseSummary>;
    async fn get_generation_summary(&self, user_id: &str) -> Result<GenerationSummary>;

    /// 按 user_id 升序分页，`after` 为上一页最后一个 user_id
    async fn list_user_ids(&self, after: Option<String>, limit: i64) -> Result<Vec<String>>;
}

/// 状态机仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FsmRepositoryTrait: Send + Sync {
    async fn get_initial_state(&self, version_id: i64) -> Result<Option<FsmState>>;
    async fn get_state(&self, id: i64) -> Result<Option<FsmState>>;

    /// 某状态的全部出向转换，按优先级降序、ID 升序
    async fn list_transitions(&self, from_state_id: i64, version_id: i64) -> Result<Vec<FsmTransition>>;

    /// 写入用户当前状态，同一用户只保留一行
    async fn upsert_user_state(&self, state: &UserFsmState) -> Result<()>;
}
