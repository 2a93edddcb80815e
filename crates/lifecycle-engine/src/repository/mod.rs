//! 数据访问层
//!
//! 引擎只依赖这里定义的 trait，PostgreSQL 实现供生产入口使用，
//! 测试中用 mockall 生成的 mock 或内存实现替代。

mod facts_repo;
mod fsm_repo;
mod traits;

pub use facts_repo::FactsRepository;
pub use fsm_repo::FsmRepository;
pub use traits::*;
