//! 生命周期批量回放
//!
//! 把全部用户回放到指定状态机版本并写入其当前状态，可重复执行。

use anyhow::{Context, Result};
use lifecycle_shared::{config::AppConfig, database::Database, observability};
use std::sync::Arc;
use tracing::info;

use lifecycle_engine::{
    BackfillRunner, ImmersionEngine,
    repository::{FactsRepository, FactsRepositoryTrait, FsmRepository, FsmRepositoryTrait},
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置
    let config = AppConfig::load("lifecycle-immersion").context("加载配置失败")?;

    // 2. 初始化可观测性
    let _guard = observability::init(&config.observability, &config.service_name)?;
    info!(environment = %config.environment, "Configuration loaded");

    let version_id = config
        .lifecycle
        .version_id
        .context("缺少目标版本，请设置 LIFECYCLE_LIFECYCLE__VERSION_ID")?;

    // 3. 初始化数据库连接
    let db = Database::connect(&config.database).await?;
    db.health_check().await?;
    db.check_schema().await?;
    let pool = db.pool().clone();

    // 4. 创建仓储与引擎
    let facts: Arc<dyn FactsRepositoryTrait> = Arc::new(FactsRepository::new(pool.clone()));
    let fsm: Arc<dyn FsmRepositoryTrait> = Arc::new(FsmRepository::new(pool));
    let engine = ImmersionEngine::new(Arc::clone(&facts), fsm, &config.lifecycle);
    let runner = BackfillRunner::new(engine, facts, &config.lifecycle);

    // 5. 执行批量回放
    info!(version_id, "Starting immersion backfill...");
    let summary = runner.run(version_id).await?;
    info!(
        processed = summary.processed,
        persisted = summary.persisted,
        skipped = summary.skipped,
        failed = summary.failed,
        "Immersion backfill finished"
    );

    db.close().await;
    Ok(())
}
