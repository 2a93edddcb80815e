//! PostgreSQL 连接池
//!
//! 回放只需要一个连接池；启动时检查连通性以及引擎依赖的表是否齐全，
//! 避免批量回放跑到一半才因缺表失败。

use crate::config::DatabaseConfig;
use crate::error::{LifecycleError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// 引擎读写的表
pub const REQUIRED_TABLES: &[&str] = &[
    "users",
    "purchases",
    "generations",
    "fsm_states",
    "fsm_transitions",
    "user_fsm_states",
];

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 按配置建立连接池
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!("Database connection pool created");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// 检查当前 schema 中是否存在全部必需的表
    pub async fn check_schema(&self) -> Result<()> {
        let tables: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_name = ANY($1)
            "#,
        )
        .bind(REQUIRED_TABLES)
        .fetch_all(&self.pool)
        .await?;

        let missing = missing_tables(&tables);
        if missing.is_empty() {
            return Ok(());
        }

        warn!(?missing, "数据库缺少必需的表");
        Err(LifecycleError::Config(format!(
            "数据库缺少必需的表: {}",
            missing.join(", ")
        )))
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

fn missing_tables(present: &[String]) -> Vec<&'static str> {
    REQUIRED_TABLES
        .iter()
        .copied()
        .filter(|table| !present.iter().any(|p| p == table))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tables() {
        let present: Vec<String> = ["users", "purchases", "fsm_states"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            missing_tables(&present),
            vec!["generations", "fsm_transitions", "user_fsm_states"]
        );

        let all: Vec<String> = REQUIRED_TABLES.iter().map(|s| s.to_string()).collect();
        assert!(missing_tables(&all).is_empty());
    }

    #[tokio::test]
    #[ignore] // 需要数据库连接
    async fn test_database_connection() {
        let config = DatabaseConfig::default();
        let db = Database::connect(&config).await.unwrap();
        db.health_check().await.unwrap();
        db.check_schema().await.unwrap();
    }
}
