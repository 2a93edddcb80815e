//! 事实值与统一类型转换
//!
//! 条件中的值是无类型文本，事实快照中的值是有类型的。所有宽松比较
//! （字符串 "true" 与布尔值、数字字符串与数字）都集中在这里处理。

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// 求值时使用的动态值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FactValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FactValue {
    /// 条件值的类型转换：数字字符串 -> 数字，"true"/"false" -> 布尔，其余保持字符串
    pub fn coerce(raw: &str) -> Self {
        match raw {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => match parse_number(raw) {
                Some(n) => Self::Number(n),
                None => Self::Text(raw.to_string()),
            },
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// 尝试转换为数字（布尔、空值、列表不参与数值转换）
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => parse_number(s),
            _ => None,
        }
    }

    /// 宽松相等
    pub fn loose_eq(&self, other: &FactValue) -> bool {
        use FactValue::*;

        match (self, other) {
            (Null, Null) => true,
            (Null, _) | (_, Null) => false,
            (Bool(a), Bool(b)) => a == b,
            (Number(a), Number(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (List(a), List(b)) => a.join(",") == b.join(","),
            (List(items), scalar) | (scalar, List(items)) => {
                Text(items.join(",")).loose_eq(scalar)
            }
            // 其余组合统一转为数字比较
            (a, b) => match (a.numeric_for_eq(), b.numeric_for_eq()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    fn numeric_for_eq(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            other => other.as_number(),
        }
    }

    /// 包含检查：列表按元素严格相等，字符串按子串
    ///
    /// 列表元素都是文本，只有文本比较值才可能命中，数字或布尔比较值不做转换。
    pub fn contains(&self, needle: &FactValue) -> bool {
        match self {
            Self::List(items) => match needle {
                Self::Text(text) => items.iter().any(|item| item == text),
                _ => false,
            },
            Self::Text(s) => s.contains(&needle.to_string()),
            _ => false,
        }
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
            Self::List(items) => write!(f, "{}", items.join(",")),
        }
    }
}

impl From<bool> for FactValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for FactValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for FactValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for FactValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FactValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<String>> for FactValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl<T: Into<FactValue>> From<Option<T>> for FactValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// 解析数字字符串，只接受有限值
fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// 字段解析来源
///
/// 无法识别的字段返回 `FactValue::Null`。
pub trait FactSource {
    fn resolve(&self, field: &str) -> FactValue;
}

impl FactSource for HashMap<String, FactValue> {
    fn resolve(&self, field: &str) -> FactValue {
        self.get(field).cloned().unwrap_or(FactValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce() {
        assert_eq!(FactValue::coerce("100"), FactValue::Number(100.0));
        assert_eq!(FactValue::coerce("-2.5"), FactValue::Number(-2.5));
        assert_eq!(FactValue::coerce("true"), FactValue::Bool(true));
        assert_eq!(FactValue::coerce("false"), FactValue::Bool(false));
        assert_eq!(FactValue::coerce("TRUE"), FactValue::Text("TRUE".into()));
        assert_eq!(FactValue::coerce("vip"), FactValue::Text("vip".into()));
        assert_eq!(FactValue::coerce(""), FactValue::Text(String::new()));
        assert_eq!(FactValue::coerce("inf"), FactValue::Text("inf".into()));
    }

    #[test]
    fn test_loose_eq_numbers_and_strings() {
        assert!(FactValue::Number(5.0).loose_eq(&FactValue::Text("5".into())));
        assert!(FactValue::Text("5.0".into()).loose_eq(&FactValue::Number(5.0)));
        assert!(!FactValue::Number(5.0).loose_eq(&FactValue::Text("five".into())));
    }

    #[test]
    fn test_loose_eq_booleans() {
        assert!(FactValue::Bool(true).loose_eq(&FactValue::Bool(true)));
        assert!(FactValue::Bool(true).loose_eq(&FactValue::Number(1.0)));
        assert!(FactValue::Bool(false).loose_eq(&FactValue::Text("0".into())));
        // 字符串 "true" 不会与布尔值相等，条件值需先经过 coerce
        assert!(!FactValue::Bool(true).loose_eq(&FactValue::Text("true".into())));
    }

    #[test]
    fn test_loose_eq_null() {
        assert!(FactValue::Null.loose_eq(&FactValue::Null));
        assert!(!FactValue::Null.loose_eq(&FactValue::Number(0.0)));
        assert!(!FactValue::Bool(false).loose_eq(&FactValue::Null));
    }

    #[test]
    fn test_loose_eq_list_joins() {
        let list = FactValue::List(vec!["vip".into()]);
        assert!(list.loose_eq(&FactValue::Text("vip".into())));
        let list = FactValue::List(vec!["a".into(), "b".into()]);
        assert!(list.loose_eq(&FactValue::Text("a,b".into())));
    }

    #[test]
    fn test_contains() {
        let tags = FactValue::List(vec!["vip".into(), "churn_risk".into()]);
        assert!(tags.contains(&FactValue::Text("vip".into())));
        assert!(!tags.contains(&FactValue::Text("new".into())));

        let model = FactValue::Text("flux-pro".into());
        assert!(model.contains(&FactValue::Text("flux".into())));
        assert!(!FactValue::Number(12.0).contains(&FactValue::Number(1.0)));
    }

    #[test]
    fn test_list_membership_is_strict() {
        let tags = FactValue::List(vec!["5".into(), "1".into(), "a,b".into()]);
        assert!(!tags.contains(&FactValue::Number(5.0)));
        assert!(!tags.contains(&FactValue::Bool(true)));
        assert!(!tags.contains(&FactValue::Text("5.0".into())));
        assert!(!tags.contains(&FactValue::Text("a".into())));
        assert!(tags.contains(&FactValue::Text("a,b".into())));
    }

    #[test]
    fn test_display() {
        assert_eq!(FactValue::Number(20.0).to_string(), "20");
        assert_eq!(FactValue::Number(2.5).to_string(), "2.5");
        assert_eq!(FactValue::Bool(true).to_string(), "true");
    }

    #[test]
    fn test_hash_map_source() {
        let mut facts = HashMap::new();
        facts.insert("credits_balance".to_string(), FactValue::Number(10.0));
        assert_eq!(facts.resolve("credits_balance"), FactValue::Number(10.0));
        assert_eq!(facts.resolve("unknown"), FactValue::Null);
    }
}
