//! 分组条件评估器
//!
//! 组内 AND、组间 OR，均短路求值；空条件列表恒为真。
//! 求值从不报错：未识别字段解析为 Null，无法比较时返回 false。

use crate::models::Condition;
use crate::operators::Operator;
use crate::value::{FactSource, FactValue};
use tracing::trace;

/// 分组求值结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupedEvaluation {
    pub matched: bool,
    /// 命中的分组（空条件列表命中时为 None）
    pub matched_group: Option<u32>,
    /// 实际求值的分组数
    pub groups_evaluated: usize,
}

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估分组条件列表
    pub fn evaluate(conditions: &[Condition], facts: &dyn FactSource) -> bool {
        Self::evaluate_detailed(conditions, facts).matched
    }

    /// 评估分组条件列表，并返回命中的分组
    pub fn evaluate_detailed(conditions: &[Condition], facts: &dyn FactSource) -> GroupedEvaluation {
        if conditions.is_empty() {
            return GroupedEvaluation {
                matched: true,
                matched_group: None,
                groups_evaluated: 0,
            };
        }

        let groups = Self::partition(conditions);
        let mut groups_evaluated = 0;

        for (group_id, members) in &groups {
            groups_evaluated += 1;

            // AND: 遇到不满足的条件立即结束本组
            if members.iter().all(|cond| Self::evaluate_condition(cond, facts)) {
                trace!(group_id, "条件分组命中");
                return GroupedEvaluation {
                    matched: true,
                    matched_group: Some(*group_id),
                    groups_evaluated,
                };
            }
        }

        GroupedEvaluation {
            matched: false,
            matched_group: None,
            groups_evaluated,
        }
    }

    /// 按 group_id 分组，组顺序取首次出现的顺序
    fn partition(conditions: &[Condition]) -> Vec<(u32, Vec<&Condition>)> {
        let mut groups: Vec<(u32, Vec<&Condition>)> = Vec::new();
        for cond in conditions {
            match groups.iter_mut().find(|(id, _)| *id == cond.group_id) {
                Some((_, members)) => members.push(cond),
                None => groups.push((cond.group_id, vec![cond])),
            }
        }
        groups
    }

    /// 评估单个条件
    pub fn evaluate_condition(cond: &Condition, facts: &dyn FactSource) -> bool {
        let actual = facts.resolve(&cond.field);
        let expected = FactValue::coerce(&cond.value);
        Self::compare(&actual, cond.operator, &expected, &cond.value)
    }

    /// 比较实际值与期望值
    ///
    /// `raw` 是未经转换的条件值，IN 对标量做逗号分隔的成员检查时使用。
    pub fn compare(actual: &FactValue, operator: Operator, expected: &FactValue, raw: &str) -> bool {
        match operator {
            Operator::Equals => actual.loose_eq(expected),
            Operator::NotEquals => !actual.loose_eq(expected),
            Operator::Gt => Self::numeric(actual, expected, |a, b| a > b),
            Operator::Gte => Self::numeric(actual, expected, |a, b| a >= b),
            Operator::Lt => Self::numeric(actual, expected, |a, b| a < b),
            Operator::Lte => Self::numeric(actual, expected, |a, b| a <= b),
            Operator::In => Self::in_values(actual, expected, raw),
            Operator::NotIn => !Self::in_values(actual, expected, raw),
            Operator::Exists => !actual.is_null(),
            Operator::NotExists => actual.is_null(),
        }
    }

    /// 数值比较：两侧都能转为数字且实际值不是布尔时才比较
    fn numeric<F>(actual: &FactValue, expected: &FactValue, cmp: F) -> bool
    where
        F: Fn(f64, f64) -> bool,
    {
        if actual.is_bool() {
            return false;
        }
        match (actual.as_number(), expected.as_number()) {
            (Some(a), Some(b)) => cmp(a, b),
            _ => false,
        }
    }

    /// 列表/字符串走包含检查，其余标量与逗号分隔的候选值逐个宽松比较
    fn in_values(actual: &FactValue, expected: &FactValue, raw: &str) -> bool {
        match actual {
            FactValue::List(_) | FactValue::Text(_) => actual.contains(expected),
            FactValue::Null => false,
            _ => raw
                .split(',')
                .map(|item| FactValue::coerce(item.trim()))
                .any(|candidate| actual.loose_eq(&candidate)),
        }
    }
}
