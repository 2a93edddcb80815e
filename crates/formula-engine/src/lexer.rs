//! 公式词法分析器
//!
//! 把公式文本切分为 token 序列，以 EOF 结尾。词法分析从不失败：
//! 无法识别的字符直接跳过。

use crate::operators::Operator;

/// token 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Field,
    Operator,
    Value,
    And,
    Or,
    LParen,
    RParen,
    Eof,
}

/// 词法单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 在原文中的字符偏移
    pub position: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
        }
    }

    /// 在原文中占用的字符数（EOF 记为 1，便于编辑器高亮）
    pub fn len(&self) -> usize {
        match self.kind {
            TokenKind::Eof => 1,
            _ => self.text.chars().count().max(1),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '!' | '<' | '>' | '=' | '.')
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | '-')
}

/// 对公式文本做词法分析
pub fn tokenize(input: &str) -> Vec<Token> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < chars.len() {
        let c = chars[pos];

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        if c == '(' {
            tokens.push(Token::new(TokenKind::LParen, "(", pos));
            pos += 1;
            continue;
        }

        if c == ')' {
            tokens.push(Token::new(TokenKind::RParen, ")", pos));
            pos += 1;
            continue;
        }

        // 引号字符串：内容原样作为值，未闭合时吃到末尾
        if c == '\'' || c == '"' {
            let start = pos;
            pos += 1;
            let content_start = pos;
            while pos < chars.len() && chars[pos] != c {
                pos += 1;
            }
            let text: String = chars[content_start..pos].iter().collect();
            tokens.push(Token::new(TokenKind::Value, text, start));
            if pos < chars.len() {
                pos += 1;
            }
            continue;
        }

        // 数字：以数字开头，或 '-' 紧跟数字
        let next_is_digit = chars.get(pos + 1).is_some_and(|n| n.is_ascii_digit());
        if c.is_ascii_digit() || (c == '-' && next_is_digit) {
            let start = pos;
            pos += 1;
            while pos < chars.len() && is_number_char(chars[pos]) {
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            tokens.push(Token::new(TokenKind::Value, text, start));
            continue;
        }

        if is_word_char(c) {
            let start = pos;
            while pos < chars.len() && is_word_char(chars[pos]) {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();

            match word.to_ascii_uppercase().as_str() {
                "AND" => tokens.push(Token::new(TokenKind::And, word, start)),
                "OR" => tokens.push(Token::new(TokenKind::Or, word, start)),
                "TRUE" | "FALSE" => {
                    tokens.push(Token::new(TokenKind::Value, word.to_ascii_lowercase(), start))
                }
                _ => match Operator::longest_prefix(&word) {
                    Some(op) => {
                        // 只消费操作符本身，其余字符重新扫描
                        let symbol = op.symbol();
                        tokens.push(Token::new(TokenKind::Operator, symbol, start));
                        pos = start + symbol.chars().count();
                    }
                    None => tokens.push(Token::new(TokenKind::Field, word, start)),
                },
            }
            continue;
        }

        pos += 1;
    }

    tokens.push(Token::new(TokenKind::Eof, "", chars.len()));
    tokens
}
