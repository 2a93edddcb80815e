//! 条件公式引擎
//!
//! 为生命周期自动化提供条件表达能力，支持：
//! - 公式文本的词法分析与递归下降解析
//! - 公式 AST 与分组条件（OR-of-ANDs）之间的双向转换
//! - 公式渲染与字段白名单校验
//! - 基于事实快照的分组条件短路求值

pub mod converter;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod models;
pub mod operators;
pub mod parser;
pub mod value;

pub use converter::{
    ast_to_conditions, ast_to_formula, conditions_to_ast, conditions_to_formula,
    formula_to_conditions,
};
pub use error::{FormulaError, Result};
pub use evaluator::{ConditionEvaluator, GroupedEvaluation};
pub use lexer::{tokenize, Token, TokenKind};
pub use models::{Condition, ConditionNode, FormulaNode, LogicalNode};
pub use operators::{LogicalOperator, Operator};
pub use parser::{parse_formula, validate_formula, Parser, ValidationResult};
pub use value::{FactSource, FactValue};
