//! 状态机图缓存
//!
//! 状态机版本发布后不再修改，批量回放时同一版本的状态与转换会被所有用户重复读取。
//! 使用 DashMap 做读穿缓存，未命中时通过仓储加载（受单步超时约束）。

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::models::{sort_candidates, FsmState, FsmTransition};
use crate::repository::FsmRepositoryTrait;
use crate::timeout::with_timeout;
use lifecycle_shared::error::Result;

/// 状态机图缓存
#[derive(Clone)]
pub struct TransitionCache {
    repo: Arc<dyn FsmRepositoryTrait>,
    step_timeout: Duration,
    /// (from_state_id, version_id) -> 排好序的候选转换
    transitions: Arc<DashMap<(i64, i64), Arc<Vec<FsmTransition>>>>,
    states: Arc<DashMap<i64, FsmState>>,
    /// version_id -> 初始状态
    initial_states: Arc<DashMap<i64, FsmState>>,
}

impl TransitionCache {
    pub fn new(repo: Arc<dyn FsmRepositoryTrait>, step_timeout: Duration) -> Self {
        Self {
            repo,
            step_timeout,
            transitions: Arc::new(DashMap::new()),
            states: Arc::new(DashMap::new()),
            initial_states: Arc::new(DashMap::new()),
        }
    }

    /// 版本的初始状态；不存在时不缓存
    pub async fn initial_state(&self, version_id: i64) -> Result<Option<FsmState>> {
        if let Some(state) = self.initial_states.get(&version_id) {
            return Ok(Some(state.clone()));
        }

        let state = with_timeout(
            "get_initial_state",
            self.step_timeout,
            self.repo.get_initial_state(version_id),
        )
        .await?;

        if let Some(state) = &state {
            self.initial_states.insert(version_id, state.clone());
            self.states.insert(state.id, state.clone());
        }
        Ok(state)
    }

    pub async fn state(&self, id: i64) -> Result<Option<FsmState>> {
        if let Some(state) = self.states.get(&id) {
            return Ok(Some(state.clone()));
        }

        let state = with_timeout("get_state", self.step_timeout, self.repo.get_state(id)).await?;
        if let Some(state) = &state {
            self.states.insert(id, state.clone());
        }
        Ok(state)
    }

    /// 某状态在版本内的候选转换，按优先级降序、ID 升序
    #[instrument(skip(self))]
    pub async fn transitions(&self, from_state_id: i64, version_id: i64) -> Result<Arc<Vec<FsmTransition>>> {
        let key = (from_state_id, version_id);
        if let Some(cached) = self.transitions.get(&key) {
            return Ok(Arc::clone(&cached));
        }

        let mut loaded = with_timeout(
            "list_transitions",
            self.step_timeout,
            self.repo.list_transitions(from_state_id, version_id),
        )
        .await?;
        // 不依赖数据源的排序
        sort_candidates(&mut loaded);

        debug!(count = loaded.len(), "转换已加载");
        let loaded = Arc::new(loaded);
        self.transitions.insert(key, Arc::clone(&loaded));
        Ok(loaded)
    }

    /// 丢弃某版本的全部缓存
    #[instrument(skip(self))]
    pub fn invalidate_version(&self, version_id: i64) {
        self.transitions.retain(|(_, version), _| *version != version_id);
        self.states.retain(|_, state| state.version_id != version_id);
        self.initial_states.remove(&version_id);
        info!("版本缓存已失效: {}", version_id);
    }

    pub fn clear(&self) {
        self.transitions.clear();
        self.states.clear();
        self.initial_states.clear();
    }

    /// 已缓存的转换列表数量
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}
