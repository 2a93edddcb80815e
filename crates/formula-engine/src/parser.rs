//! 公式解析器
//!
//! 递归下降解析，AND 优先级高于 OR，括号可改变结合：
//!
//! ```text
//! expression := or_expr
//! or_expr    := and_expr (OR and_expr)*
//! and_expr   := primary (AND primary)*
//! primary    := condition | '(' expression ')'
//! condition  := FIELD OPERATOR VALUE
//! ```

use crate::error::{FormulaError, Result};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::models::{ConditionNode, FormulaNode};
use crate::operators::Operator;
use serde::Serialize;

/// 解析器状态：token 切片 + 当前位置
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    /// `tokens` 需以 EOF 结尾（`tokenize` 的输出满足这一点）
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    /// 解析完整表达式，末尾有多余 token 时报错
    pub fn parse(mut self) -> Result<FormulaNode> {
        let node = self.parse_or()?;

        let trailing = self.peek();
        if trailing.kind != TokenKind::Eof {
            return Err(FormulaError::parse(
                format!("表达式结束后存在多余内容 '{}'", trailing.text),
                trailing.position,
            ));
        }

        Ok(node)
    }

    fn peek(&self) -> &'a Token {
        // 越界时停在最后一个 token（EOF）
        let idx = self.pos.min(self.tokens.len().saturating_sub(1));
        &self.tokens[idx]
    }

    fn advance(&mut self) -> &'a Token {
        let token = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<FormulaNode> {
        let mut left = self.parse_and()?;
        while self.peek().kind == TokenKind::Or {
            self.advance();
            let right = self.parse_and()?;
            left = FormulaNode::or(left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<FormulaNode> {
        let mut left = self.parse_primary()?;
        while self.peek().kind == TokenKind::And {
            self.advance();
            let right = self.parse_primary()?;
            left = FormulaNode::and(left, right);
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<FormulaNode> {
        if self.peek().kind == TokenKind::LParen {
            let open = self.advance();
            let inner = self.parse_or()?;

            let close = self.peek();
            if close.kind != TokenKind::RParen {
                return Err(FormulaError::parse(
                    format!("位置 {} 的左括号缺少匹配的右括号", open.position),
                    close.position,
                ));
            }
            self.advance();
            return Ok(inner);
        }

        self.parse_condition()
    }

    fn parse_condition(&mut self) -> Result<FormulaNode> {
        let field = self.peek();
        if field.kind != TokenKind::Field {
            let message = match field.kind {
                TokenKind::Eof => "缺少条件：期望字段名".to_string(),
                _ => format!("期望字段名，实际为 '{}'", field.text),
            };
            return Err(FormulaError::parse(message, field.position));
        }
        self.advance();

        let op_token = self.peek();
        let operator = match op_token.kind {
            TokenKind::Operator => Operator::from_symbol(&op_token.text),
            _ => None,
        };
        let Some(operator) = operator else {
            return Err(FormulaError::parse(
                format!("字段 '{}' 后缺少操作符", field.text),
                op_token.position,
            ));
        };
        self.advance();

        let value = self.peek();
        if value.kind != TokenKind::Value {
            return Err(FormulaError::parse(
                format!("操作符 '{}' 后缺少值", op_token.text),
                value.position,
            ));
        }
        self.advance();

        Ok(FormulaNode::Condition(
            ConditionNode::new(&field.text, operator, &value.text).at(field.position),
        ))
    }
}

/// 解析公式文本
pub fn parse_formula(input: &str) -> Result<FormulaNode> {
    let tokens = tokenize(input);
    Parser::new(&tokens).parse()
}

/// 公式校验结果（不抛错，供编辑器嵌入使用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
            position: None,
            length: None,
        }
    }

    pub fn invalid(error: impl Into<String>, position: usize, length: usize) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            position: Some(position),
            length: Some(length),
        }
    }
}

/// 校验公式：语法错误与未知字段都转为 `valid = false`
///
/// 空白公式视为合法（对应空条件列表）。
pub fn validate_formula(input: &str, known_fields: &[&str]) -> ValidationResult {
    if input.trim().is_empty() {
        return ValidationResult::ok();
    }

    let tokens = tokenize(input);
    let ast = match Parser::new(&tokens).parse() {
        Ok(ast) => ast,
        Err(e) => {
            let length = tokens
                .iter()
                .find(|t| t.position == e.position())
                .map(Token::len)
                .unwrap_or(1);
            return ValidationResult::invalid(e.message(), e.position(), length);
        }
    };

    for leaf in ast.leaves() {
        if !known_fields.contains(&leaf.field.as_str()) {
            return ValidationResult::invalid(
                format!("未知字段 '{}'", leaf.field),
                leaf.position.unwrap_or(0),
                leaf.field.chars().count(),
            );
        }
    }

    ValidationResult::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::LogicalOperator;

    const FIELDS: &[&str] = &["credits_balance", "is_paid_user", "total_generations"];

    fn expect_err(input: &str) -> FormulaError {
        match parse_formula(input) {
            Err(e) => e,
            Ok(ast) => panic!("expected parse error for {input:?}, got {ast:?}"),
        }
    }

    #[test]
    fn test_single_condition() {
        let ast = parse_formula("credits_balance >= 20").unwrap();
        assert_eq!(
            ast,
            FormulaNode::Condition(
                ConditionNode::new("credits_balance", Operator::Gte, "20").at(0)
            )
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let ast = parse_formula("a == 1 OR b == 2 AND c == 3").unwrap();
        let FormulaNode::Logical(root) = ast else {
            panic!("expected logical root");
        };
        assert_eq!(root.operator, LogicalOperator::Or);
        assert!(matches!(*root.left, FormulaNode::Condition(ref c) if c.field == "a"));
        let FormulaNode::Logical(ref right) = *root.right else {
            panic!("expected AND on the right");
        };
        assert_eq!(right.operator, LogicalOperator::And);
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let ast = parse_formula("(a == 1 OR b == 2) AND c == 3").unwrap();
        let FormulaNode::Logical(root) = ast else {
            panic!("expected logical root");
        };
        assert_eq!(root.operator, LogicalOperator::And);
        assert!(matches!(*root.left, FormulaNode::Logical(ref l) if l.operator == LogicalOperator::Or));
    }

    #[test]
    fn test_chains_are_left_associative() {
        let ast = parse_formula("a == 1 AND b == 2 AND c == 3").unwrap();
        let FormulaNode::Logical(root) = ast else {
            panic!("expected logical root");
        };
        assert!(matches!(*root.left, FormulaNode::Logical(_)));
        assert!(matches!(*root.right, FormulaNode::Condition(ref c) if c.field == "c"));
    }

    #[test]
    fn test_missing_value_points_after_operator() {
        let err = expect_err("credits >");
        assert_eq!(err.position(), 9);
        assert!(err.message().contains(">"));
    }

    #[test]
    fn test_missing_operator() {
        let err = expect_err("credits_balance 100");
        assert_eq!(err.position(), 16);
    }

    #[test]
    fn test_bare_word_is_not_a_value() {
        let err = expect_err("user_tags in vip");
        assert_eq!(err.position(), 13);
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let err = expect_err("(a == 1 OR b == 2");
        assert_eq!(err.position(), 17);

        let err = expect_err("a == 1)");
        assert_eq!(err.position(), 6);
    }

    #[test]
    fn test_trailing_tokens() {
        let err = expect_err("a == 1 b == 2");
        assert_eq!(err.position(), 7);
    }

    #[test]
    fn test_empty_input_fails() {
        let err = expect_err("");
        assert_eq!(err.position(), 0);
    }

    #[test]
    fn test_parser_is_reentrant() {
        let tokens = tokenize("a == 1 AND b == 2");
        let first = Parser::new(&tokens).parse().unwrap();
        let second = Parser::new(&tokens).parse().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_validate_ok() {
        let result = validate_formula("credits_balance > 10 AND is_paid_user == true", FIELDS);
        assert_eq!(result, ValidationResult::ok());
    }

    #[test]
    fn test_validate_blank_is_valid() {
        assert!(validate_formula("  ", FIELDS).valid);
    }

    #[test]
    fn test_validate_syntax_error() {
        let result = validate_formula("credits_balance >", FIELDS);
        assert!(!result.valid);
        assert_eq!(result.position, Some(17));
        assert_eq!(result.length, Some(1));
        assert!(result.error.is_some());
    }

    #[test]
    fn test_validate_reports_first_unknown_field() {
        let result = validate_formula(
            "credits_balance > 10 OR karma > 3 OR mood == 'ok'",
            FIELDS,
        );
        assert!(!result.valid);
        assert_eq!(result.position, Some(24));
        assert_eq!(result.length, Some(5));
        assert!(result.error.unwrap().contains("karma"));
    }

    #[test]
    fn test_validation_result_serializes_camel_case() {
        let json = serde_json::to_value(ValidationResult::invalid("bad", 3, 2)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"valid": false, "error": "bad", "position": 3, "length": 2})
        );
        let json = serde_json::to_value(ValidationResult::ok()).unwrap();
        assert_eq!(json, serde_json::json!({"valid": true}));
    }
}
