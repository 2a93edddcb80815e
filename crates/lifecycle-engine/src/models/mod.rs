//! 领域模型
//!
//! - `fsm`: 状态机版本中的状态、转换与用户当前状态
//! - `action`: 转换动作（强类型联合体 + 持久化适配）
//! - `facts`: 数据访问层提供的原始用户事实

pub mod action;
pub mod facts;
pub mod fsm;

pub use action::*;
pub use facts::*;
pub use fsm::*;
