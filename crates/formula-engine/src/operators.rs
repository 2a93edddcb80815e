//! 条件操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 条件操作符
///
/// 持久化时使用内部名称（`EQUALS`、`NOT_IN` 等），公式文本中使用显示符号（`==`、`!in` 等）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    // 通用比较
    Equals,
    NotEquals,

    // 数值比较
    Gt,
    Gte,
    Lt,
    Lte,

    // 包含检查
    In,
    NotIn,

    // 空值检查
    Exists,
    NotExists,
}

impl Operator {
    /// 全部操作符
    pub const ALL: [Operator; 10] = [
        Self::Equals,
        Self::NotEquals,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::In,
        Self::NotIn,
        Self::Exists,
        Self::NotExists,
    ];

    /// 公式文本中的显示符号
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::In => "in",
            Self::NotIn => "!in",
            Self::Exists => "exists",
            Self::NotExists => "!exists",
        }
    }

    /// 显示符号 -> 操作符
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    /// 返回 `text` 开头能匹配的最长操作符符号
    pub fn longest_prefix(text: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .filter(|op| text.starts_with(op.symbol()))
            .max_by_key(|op| op.symbol().len())
    }

    /// 持久化使用的内部名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "EQUALS",
            Self::NotEquals => "NOT_EQUALS",
            Self::Gt => "GT",
            Self::Gte => "GTE",
            Self::Lt => "LT",
            Self::Lte => "LTE",
            Self::In => "IN",
            Self::NotIn => "NOT_IN",
            Self::Exists => "EXISTS",
            Self::NotExists => "NOT_EXISTS",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// 逻辑操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_prefix_prefers_two_char_symbols() {
        assert_eq!(Operator::longest_prefix(">=5"), Some(Operator::Gte));
        assert_eq!(Operator::longest_prefix(">5"), Some(Operator::Gt));
        assert_eq!(Operator::longest_prefix("!inx"), Some(Operator::NotIn));
        assert_eq!(Operator::longest_prefix("!exists"), Some(Operator::NotExists));
        assert_eq!(Operator::longest_prefix("!="), Some(Operator::NotEquals));
        assert_eq!(Operator::longest_prefix("credits"), None);
    }

    #[test]
    fn test_symbol_round_trip() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_symbol(op.symbol()), Some(op));
        }
    }

    #[test]
    fn test_serde_uses_internal_names() {
        let json = serde_json::to_string(&Operator::NotExists).unwrap();
        assert_eq!(json, "\"NOT_EXISTS\"");

        let op: Operator = serde_json::from_str("\"GTE\"").unwrap();
        assert_eq!(op, Operator::Gte);
        assert_eq!(op.as_str(), "GTE");
    }
}
