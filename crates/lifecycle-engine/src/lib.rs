//! 用户生命周期引擎
//!
//! 把用户的原始事实派生为事实快照，在状态机版本内按优先级选择转换，
//! 并能从初始状态回放出用户当前应处的状态。
//!
//! ## 模块
//!
//! - `context`: 事实快照与字段表
//! - `selector`: 触发推断与转换选择
//! - `immersion`: 单用户状态回放
//! - `backfill`: 全量用户批量回放
//! - `dispatch`: 真实事件驱动转换时的动作下发
//! - `repository`: 数据访问抽象与 PostgreSQL 实现

pub mod backfill;
pub mod cache;
pub mod context;
pub mod dispatch;
pub mod immersion;
pub mod models;
pub mod repository;
pub mod selector;
pub mod timeout;

pub use backfill::{BackfillRunner, BackfillSummary};
pub use cache::TransitionCache;
pub use context::{Context, ContextBuilder};
pub use dispatch::{ActionDispatcher, ActionHandoff, DispatchOutcome, DispatchReport};
pub use immersion::{ImmersionEngine, ImmersionOutcome, ImmersionReport, StopReason};
pub use lifecycle_shared::error::{LifecycleError, Result};
pub use selector::{TransitionSelector, TriggerFlags};
