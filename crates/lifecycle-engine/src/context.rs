//! 事实上下文
//!
//! 每次评估前从原始事实完整派生，构建后不再修改。条件公式中可用的字段
//! 由 `Context::FIELDS` 固定列出，公式校验的白名单与求值时的字段解析共用这一张表。

use chrono::{DateTime, Utc};
use formula_engine::{FactSource, FactValue};
use serde::Serialize;

use crate::models::RawFacts;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// 用户事实快照
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub credits: f64,
    pub total_generations: i64,
    pub total_payments: i64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_generation_at: Option<DateTime<Utc>>,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub last_payment_failed: bool,
    pub is_paid_user: bool,
    pub is_low_balance: bool,
    pub days_since_created: f64,
    pub hours_since_last_pay: Option<f64>,
    pub hours_since_last_gen: Option<f64>,
    pub hours_since_last_activity: Option<f64>,
    pub preferred_model: Option<String>,
    pub active_overlays: Vec<String>,
}

impl Context {
    /// 条件公式可引用的字段
    pub const FIELDS: &'static [&'static str] = &[
        "credits_balance",
        "total_generations",
        "total_payments",
        "is_paid_user",
        "user_tags",
        "preferred_model",
        "last_payment_failed",
        "days_since_created",
        "hours_since_last_pay",
        "hours_since_last_gen",
        "hours_since_last_activity",
        "is_low_balance",
        "is_freeloader",
        "is_dead",
        "active_overlays",
    ];

    /// 生成过内容、从未付费且余额不足
    pub fn is_freeloader(&self) -> bool {
        self.total_generations >= 1 && self.total_payments == 0 && self.is_low_balance
    }

    /// 从未生成过内容
    pub fn is_dead(&self) -> bool {
        self.total_generations == 0
    }
}

impl FactSource for Context {
    fn resolve(&self, field: &str) -> FactValue {
        match field {
            "credits_balance" => self.credits.into(),
            "total_generations" => self.total_generations.into(),
            "total_payments" => self.total_payments.into(),
            "is_paid_user" => self.is_paid_user.into(),
            "user_tags" => self.tags.clone().into(),
            "preferred_model" => self.preferred_model.clone().into(),
            "last_payment_failed" => self.last_payment_failed.into(),
            "days_since_created" => self.days_since_created.into(),
            "hours_since_last_pay" => self.hours_since_last_pay.into(),
            "hours_since_last_gen" => self.hours_since_last_gen.into(),
            "hours_since_last_activity" => self.hours_since_last_activity.into(),
            "is_low_balance" => self.is_low_balance.into(),
            "is_freeloader" => self.is_freeloader().into(),
            "is_dead" => self.is_dead().into(),
            "active_overlays" => self.active_overlays.clone().into(),
            _ => FactValue::Null,
        }
    }
}

/// 上下文构建器
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    low_balance_threshold: f64,
}

impl ContextBuilder {
    pub fn new(low_balance_threshold: f64) -> Self {
        Self {
            low_balance_threshold,
        }
    }

    /// 从原始事实派生上下文
    pub fn build(&self, raw: &RawFacts, now: DateTime<Utc>) -> Context {
        let user = &raw.user;
        let purchases = &raw.purchases;
        let total_payments = purchases.completed_count;

        // 最近一次失败晚于最近一次成功（或从未成功）才视为付款失败
        let last_payment_failed = match (purchases.latest_failed_at, purchases.latest_completed_at) {
            (Some(_), None) => true,
            (Some(failed), Some(completed)) => failed > completed,
            (None, _) => false,
        };

        Context {
            credits: user.credits,
            total_generations: raw.generations.total_count,
            total_payments,
            tags: user.tags.clone(),
            created_at: user.created_at,
            last_generation_at: raw.generations.latest_at,
            last_payment_at: purchases.latest_completed_at,
            last_payment_failed,
            is_paid_user: total_payments > 0,
            is_low_balance: user.credits < self.low_balance_threshold,
            days_since_created: elapsed(now, user.created_at, MILLIS_PER_DAY),
            hours_since_last_pay: purchases
                .latest_completed_at
                .map(|at| elapsed(now, at, MILLIS_PER_HOUR)),
            hours_since_last_gen: raw
                .generations
                .latest_at
                .map(|at| elapsed(now, at, MILLIS_PER_HOUR)),
            hours_since_last_activity: user
                .last_active_at
                .map(|at| elapsed(now, at, MILLIS_PER_HOUR)),
            preferred_model: user.preferred_model.clone(),
            active_overlays: user.active_overlays.clone(),
        }
    }
}

fn elapsed(now: DateTime<Utc>, since: DateTime<Utc>, unit_millis: f64) -> f64 {
    (now - since).num_milliseconds() as f64 / unit_millis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenerationSummary, PurchaseSummary, UserFacts};
    use chrono::{Duration, TimeZone};
    use formula_engine::{formula_to_conditions, validate_formula, ConditionEvaluator};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn raw(credits: f64, payments: i64, generations: i64) -> RawFacts {
        RawFacts {
            user: UserFacts {
                user_id: "u-1".to_string(),
                credits,
                tags: vec!["trial".to_string()],
                created_at: now() - Duration::days(3),
                last_active_at: Some(now() - Duration::hours(6)),
                is_blocked: false,
                preferred_model: Some("flux".to_string()),
                active_overlays: vec![],
            },
            purchases: PurchaseSummary {
                completed_count: payments,
                latest_completed_at: None,
                latest_failed_at: None,
            },
            generations: GenerationSummary {
                total_count: generations,
                latest_at: None,
            },
        }
    }

    #[test]
    fn test_derived_flags() {
        let builder = ContextBuilder::new(20.0);

        let ctx = builder.build(&raw(5.0, 0, 2), now());
        assert!(!ctx.is_paid_user);
        assert!(ctx.is_low_balance);
        assert!(ctx.is_freeloader());
        assert!(!ctx.is_dead());

        let ctx = builder.build(&raw(20.0, 1, 0), now());
        assert!(ctx.is_paid_user);
        assert!(!ctx.is_low_balance);
        assert!(!ctx.is_freeloader());
        assert!(ctx.is_dead());
    }

    #[test]
    fn test_threshold_is_configurable() {
        let ctx = ContextBuilder::new(100.0).build(&raw(50.0, 0, 0), now());
        assert!(ctx.is_low_balance);
    }

    #[test]
    fn test_elapsed_times() {
        let mut facts = raw(0.0, 1, 1);
        facts.purchases.latest_completed_at = Some(now() - Duration::minutes(90));
        facts.generations.latest_at = Some(now() - Duration::hours(48));

        let ctx = ContextBuilder::new(20.0).build(&facts, now());
        assert_eq!(ctx.days_since_created, 3.0);
        assert_eq!(ctx.hours_since_last_pay, Some(1.5));
        assert_eq!(ctx.hours_since_last_gen, Some(48.0));
        assert_eq!(ctx.hours_since_last_activity, Some(6.0));
    }

    #[test]
    fn test_absent_timestamps_stay_undefined() {
        let ctx = ContextBuilder::new(20.0).build(&raw(0.0, 0, 0), now());
        assert_eq!(ctx.hours_since_last_pay, None);
        assert_eq!(ctx.hours_since_last_gen, None);
        assert_eq!(ctx.resolve("hours_since_last_pay"), FactValue::Null);
    }

    #[test]
    fn test_last_payment_failed() {
        let builder = ContextBuilder::new(20.0);

        let mut facts = raw(0.0, 0, 0);
        facts.purchases.latest_failed_at = Some(now() - Duration::hours(1));
        assert!(builder.build(&facts, now()).last_payment_failed);

        facts.purchases.completed_count = 1;
        facts.purchases.latest_completed_at = Some(now() - Duration::hours(2));
        assert!(builder.build(&facts, now()).last_payment_failed);

        facts.purchases.latest_completed_at = Some(now() - Duration::minutes(10));
        assert!(!builder.build(&facts, now()).last_payment_failed);

        facts.purchases.latest_failed_at = None;
        assert!(!builder.build(&facts, now()).last_payment_failed);
    }

    #[test]
    fn test_symbol_table() {
        let ctx = ContextBuilder::new(20.0).build(&raw(7.5, 0, 3), now());
        assert_eq!(ctx.resolve("credits_balance"), FactValue::Number(7.5));
        assert_eq!(ctx.resolve("total_generations"), FactValue::Number(3.0));
        assert_eq!(ctx.resolve("user_tags"), FactValue::List(vec!["trial".to_string()]));
        assert_eq!(ctx.resolve("preferred_model"), FactValue::Text("flux".to_string()));
        assert_eq!(ctx.resolve("is_freeloader"), FactValue::Bool(true));
        assert_eq!(ctx.resolve("karma"), FactValue::Null);

        for field in Context::FIELDS {
            assert!(validate_formula(&format!("{field} exists true"), Context::FIELDS).valid);
        }
    }

    #[test]
    fn test_grouped_evaluation_against_context() {
        let conditions = formula_to_conditions(
            "credits_balance > 100 AND is_paid_user == true OR total_generations < 5",
        )
        .unwrap();
        let builder = ContextBuilder::new(20.0);

        assert!(ConditionEvaluator::evaluate(&conditions, &builder.build(&raw(150.0, 1, 10), now())));
        assert!(!ConditionEvaluator::evaluate(&conditions, &builder.build(&raw(150.0, 0, 10), now())));
        assert!(ConditionEvaluator::evaluate(&conditions, &builder.build(&raw(5.0, 0, 2), now())));
    }
}
