//! 公式引擎领域模型

use crate::operators::{LogicalOperator, Operator};
use serde::{Deserialize, Serialize};

/// 公式 AST 节点（条件叶子或二元逻辑节点）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormulaNode {
    Condition(ConditionNode),
    Logical(LogicalNode),
}

impl FormulaNode {
    pub fn condition(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self::Condition(ConditionNode::new(field, operator, value))
    }

    pub fn and(left: FormulaNode, right: FormulaNode) -> Self {
        Self::Logical(LogicalNode::new(LogicalOperator::And, left, right))
    }

    pub fn or(left: FormulaNode, right: FormulaNode) -> Self {
        Self::Logical(LogicalNode::new(LogicalOperator::Or, left, right))
    }

    /// 按从左到右的顺序收集所有条件叶子
    pub fn leaves(&self) -> Vec<&ConditionNode> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a ConditionNode>) {
        match self {
            Self::Condition(cond) => out.push(cond),
            Self::Logical(node) => {
                node.left.collect_leaves(out);
                node.right.collect_leaves(out);
            }
        }
    }
}

/// 条件叶子：`field op value`
///
/// value 保持原始文本，类型在求值时才确定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionNode {
    pub field: String,
    pub operator: Operator,
    pub value: String,
    /// 字段 token 在公式原文中的字符偏移，非解析得到的节点为 None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl ConditionNode {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            position: None,
        }
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

/// 二元逻辑节点，不支持一元 NOT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalNode {
    pub operator: LogicalOperator,
    pub left: Box<FormulaNode>,
    pub right: Box<FormulaNode>,
}

impl LogicalNode {
    pub fn new(operator: LogicalOperator, left: FormulaNode, right: FormulaNode) -> Self {
        Self {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// 持久化的扁平条件
///
/// 相同 group_id 的条件之间为 AND，不同 group_id 之间为 OR。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: String,
    pub group_id: u32,
}

impl Condition {
    pub fn new(
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<String>,
        group_id: u32,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            group_id,
        }
    }
}
