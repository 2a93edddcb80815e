//! 公式引擎错误类型

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// 结构性解析错误，position 为出错 token 的字符偏移
    #[error("公式解析失败 (位置 {position}): {message}")]
    Parse { message: String, position: usize },
}

impl FormulaError {
    pub fn parse(message: impl Into<String>, position: usize) -> Self {
        Self::Parse {
            message: message.into(),
            position,
        }
    }

    /// 出错位置（字符偏移）
    pub fn position(&self) -> usize {
        match self {
            Self::Parse { position, .. } => *position,
        }
    }

    /// 不带位置前缀的错误描述
    pub fn message(&self) -> &str {
        match self {
            Self::Parse { message, .. } => message,
        }
    }
}

pub type Result<T> = std::result::Result<T, FormulaError>;
