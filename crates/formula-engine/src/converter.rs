//! 公式 AST 与分组条件之间的转换
//!
//! 分组条件只能表达 OR-of-ANDs 形状。`ast_to_conditions` 不做 AND/OR 分配律展开：
//! OR 嵌套在 AND 分支里的公式（如 `(a OR b) AND c`）会得到语义不同的分组。
//! 由 `conditions_to_ast` 构造的 AST 能够无损往返。

use crate::error::Result;
use crate::models::{Condition, ConditionNode, FormulaNode};
use crate::operators::LogicalOperator;
use crate::parser::parse_formula;

/// AST -> 扁平分组条件
pub fn ast_to_conditions(ast: &FormulaNode) -> Vec<Condition> {
    let mut conditions = Vec::new();
    let mut counter = 0u32;
    collect_conditions(ast, 0, &mut counter, &mut conditions);
    conditions
}

fn collect_conditions(
    node: &FormulaNode,
    group_id: u32,
    counter: &mut u32,
    out: &mut Vec<Condition>,
) {
    match node {
        FormulaNode::Condition(leaf) => out.push(Condition::new(
            &leaf.field,
            leaf.operator,
            &leaf.value,
            group_id,
        )),
        FormulaNode::Logical(logical) => match logical.operator {
            LogicalOperator::And => {
                collect_conditions(&logical.left, group_id, counter, out);
                collect_conditions(&logical.right, group_id, counter, out);
            }
            LogicalOperator::Or => {
                collect_conditions(&logical.left, group_id, counter, out);
                *counter += 1;
                let right_group = *counter;
                collect_conditions(&logical.right, right_group, counter, out);
            }
        },
    }
}

/// 扁平分组条件 -> AST
///
/// 每组构造左结合的 AND 链，再把各组组合成左结合的 OR 链。空列表返回 None。
pub fn conditions_to_ast(conditions: &[Condition]) -> Option<FormulaNode> {
    let mut groups: Vec<(u32, Vec<&Condition>)> = Vec::new();
    for cond in conditions {
        match groups.iter_mut().find(|(id, _)| *id == cond.group_id) {
            Some((_, members)) => members.push(cond),
            None => groups.push((cond.group_id, vec![cond])),
        }
    }

    groups
        .into_iter()
        .filter_map(|(_, members)| {
            members
                .into_iter()
                .map(|c| FormulaNode::Condition(ConditionNode::new(&c.field, c.operator, &c.value)))
                .reduce(FormulaNode::and)
        })
        .reduce(FormulaNode::or)
}

/// AST -> 公式文本
///
/// AND 子树仅在父节点为 OR 时加括号。值同时含单双引号时结果不能再解析回原值，
/// 见 [`render_value`]。
pub fn ast_to_formula(ast: &FormulaNode) -> String {
    render(ast, None)
}

fn render(node: &FormulaNode, parent: Option<LogicalOperator>) -> String {
    match node {
        FormulaNode::Condition(leaf) => format!(
            "{} {} {}",
            leaf.field,
            leaf.operator.symbol(),
            render_value(&leaf.value)
        ),
        FormulaNode::Logical(logical) => {
            let left = render(&logical.left, Some(logical.operator));
            let right = render(&logical.right, Some(logical.operator));
            let joined = format!("{} {} {}", left, logical.operator, right);

            if logical.operator == LogicalOperator::And && parent == Some(LogicalOperator::Or) {
                format!("({})", joined)
            } else {
                joined
            }
        }
    }
}

/// 数字与 true/false 原样输出，其余加引号
///
/// 引号内不支持转义：含双引号的值改用单引号包裹，同时含两种引号的值
/// 无法表示，渲染结果再解析会得到不同的值或解析失败。
fn render_value(value: &str) -> String {
    if value == "true" || value == "false" || is_numeric_literal(value) {
        return value.to_string();
    }

    if value.contains('"') {
        format!("'{}'", value)
    } else {
        format!("\"{}\"", value)
    }
}

/// 能被词法分析器整体识别为数字 token 的文本
fn is_numeric_literal(value: &str) -> bool {
    let mut chars = value.chars();
    let first_ok = match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('-') => value[1..].starts_with(|c: char| c.is_ascii_digit()),
        _ => false,
    };

    first_ok
        && value.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-')
        && value.parse::<f64>().is_ok()
}

/// 公式文本 -> 分组条件，空白公式对应空列表
pub fn formula_to_conditions(formula: &str) -> Result<Vec<Condition>> {
    if formula.trim().is_empty() {
        return Ok(Vec::new());
    }
    let ast = parse_formula(formula)?;
    Ok(ast_to_conditions(&ast))
}

/// 分组条件 -> 公式文本，空列表对应空字符串
pub fn conditions_to_formula(conditions: &[Condition]) -> String {
    conditions_to_ast(conditions)
        .map(|ast| ast_to_formula(&ast))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::Operator;

    fn leaf(field: &str, value: &str) -> FormulaNode {
        FormulaNode::condition(field, Operator::Equals, value)
    }

    #[test]
    fn test_ast_to_conditions_canonical_shape() {
        let ast = parse_formula("a == 1 AND b == 2 OR c == 3").unwrap();
        let conditions = ast_to_conditions(&ast);
        assert_eq!(
            conditions,
            vec![
                Condition::new("a", Operator::Equals, "1", 0),
                Condition::new("b", Operator::Equals, "2", 0),
                Condition::new("c", Operator::Equals, "3", 1),
            ]
        );
    }

    #[test]
    fn test_ast_to_conditions_nested_or_increments_counter() {
        let ast = FormulaNode::or(FormulaNode::or(leaf("a", "1"), leaf("b", "2")), leaf("c", "3"));
        let groups: Vec<u32> = ast_to_conditions(&ast).iter().map(|c| c.group_id).collect();
        assert_eq!(groups, vec![0, 1, 2]);
    }

    #[test]
    fn test_ast_to_conditions_or_inside_and_is_not_distributed() {
        // (a OR b) AND c 真正含义是 (a AND c) OR (b AND c)，分组结果为 {a, c} OR {b}
        let ast = parse_formula("(a == 1 OR b == 2) AND c == 3").unwrap();
        let conditions = ast_to_conditions(&ast);
        assert_eq!(
            conditions,
            vec![
                Condition::new("a", Operator::Equals, "1", 0),
                Condition::new("b", Operator::Equals, "2", 1),
                Condition::new("c", Operator::Equals, "3", 0),
            ]
        );
    }

    #[test]
    fn test_conditions_to_ast_empty_and_single() {
        assert_eq!(conditions_to_ast(&[]), None);
        let single = conditions_to_ast(&[Condition::new("a", Operator::Gt, "1", 4)]).unwrap();
        assert_eq!(single, FormulaNode::condition("a", Operator::Gt, "1"));
    }

    #[test]
    fn test_conditions_to_ast_groups_by_first_appearance() {
        let conditions = vec![
            Condition::new("x", Operator::Equals, "1", 5),
            Condition::new("y", Operator::Equals, "2", 2),
            Condition::new("z", Operator::Equals, "3", 5),
        ];
        let ast = conditions_to_ast(&conditions).unwrap();
        assert_eq!(
            ast,
            FormulaNode::or(FormulaNode::and(leaf("x", "1"), leaf("z", "3")), leaf("y", "2"))
        );
    }

    #[test]
    fn test_conditions_to_ast_and_chain_is_left_associative() {
        let conditions = vec![
            Condition::new("a", Operator::Equals, "1", 0),
            Condition::new("b", Operator::Equals, "2", 0),
            Condition::new("c", Operator::Equals, "3", 0),
        ];
        let ast = conditions_to_ast(&conditions).unwrap();
        assert_eq!(
            ast,
            FormulaNode::and(FormulaNode::and(leaf("a", "1"), leaf("b", "2")), leaf("c", "3"))
        );
    }

    #[test]
    fn test_ast_to_formula_golden() {
        let conditions = vec![
            Condition::new("credits_balance", Operator::Gt, "100", 0),
            Condition::new("is_paid_user", Operator::Equals, "true", 0),
            Condition::new("user_tags", Operator::In, "vip", 1),
            Condition::new("preferred_model", Operator::NotExists, "true", 2),
        ];
        assert_eq!(
            conditions_to_formula(&conditions),
            "(credits_balance > 100 AND is_paid_user == true) OR user_tags in \"vip\" OR preferred_model !exists true"
        );
    }

    #[test]
    fn test_ast_to_formula_no_parens_without_or_parent() {
        let ast = FormulaNode::and(leaf("a", "1"), FormulaNode::or(leaf("b", "x"), leaf("c", "-2.5")));
        assert_eq!(ast_to_formula(&ast), "a == 1 AND b == \"x\" OR c == -2.5");
    }

    #[test]
    fn test_render_value_quoting() {
        assert_eq!(render_value("42"), "42");
        assert_eq!(render_value("-3"), "-3");
        assert_eq!(render_value("false"), "false");
        assert_eq!(render_value("TRUE"), "\"TRUE\"");
        assert_eq!(render_value(""), "\"\"");
        assert_eq!(render_value("1e5"), "\"1e5\"");
        assert_eq!(render_value("inf"), "\"inf\"");
        assert_eq!(render_value("say \"hi\""), "'say \"hi\"'");
    }

    #[test]
    fn test_quoted_values_round_trip_unless_both_quotes() {
        for value in ["it's", "say \"hi\""] {
            let formula = conditions_to_formula(&[Condition::new("preferred_model", Operator::Equals, value, 0)]);
            let back = formula_to_conditions(&formula).unwrap();
            assert_eq!(back[0].value, value);
        }

        let mixed = "it's \"x\"";
        let formula = conditions_to_formula(&[Condition::new("preferred_model", Operator::Equals, mixed, 0)]);
        let reparsed = formula_to_conditions(&formula);
        assert!(!matches!(reparsed, Ok(ref c) if c.len() == 1 && c[0].value == mixed));
    }

    #[test]
    fn test_formula_helpers_round_trip_text() {
        let formula = "(credits_balance >= 20 AND total_payments == 0) OR is_dead == true";
        let conditions = formula_to_conditions(formula).unwrap();
        assert_eq!(conditions.len(), 3);
        assert_eq!(conditions_to_formula(&conditions), formula);
    }

    #[test]
    fn test_blank_formula_is_empty_list() {
        assert!(formula_to_conditions("   ").unwrap().is_empty());
        assert_eq!(conditions_to_formula(&[]), "");
    }

    #[test]
    fn test_formula_to_conditions_propagates_parse_error() {
        let err = formula_to_conditions("credits >").unwrap_err();
        assert_eq!(err.position(), 9);
    }
}
