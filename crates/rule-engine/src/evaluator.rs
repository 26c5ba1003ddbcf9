//! 规则评估器
//!
//! 递归遍历规则树并返回布尔结果。评估永不失败：任何错误都在当前节点
//! 降级为 `false`，并以 [`Diagnostic`] 的形式交给调用方提供的接收器。
//! 逻辑组不做短路求值，保证每个子节点的问题都能被报告。

use crate::coercion::{coerce, parse_date, Comparable};
use crate::compatibility::is_operator_allowed;
use crate::error::{Diagnostic, DiagnosticSink, Ignore, Result, RuleError};
use crate::models::{condition_path, PropertyBag, Rule, RuleGroup, RuleNode};
use crate::operators::{FieldType, LogicalOperator, Operator};
use serde_json::Value;
use tracing::debug;

/// 评估规则树，丢弃诊断
pub fn evaluate(node: &RuleNode, context: &PropertyBag) -> bool {
    evaluate_with(node, context, &mut Ignore)
}

/// 评估规则树，诊断按先序、从左到右的顺序写入 `sink`
pub fn evaluate_with(node: &RuleNode, context: &PropertyBag, sink: &mut dyn DiagnosticSink) -> bool {
    NodeWalker::new(context, sink).walk(node, "")
}

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估单个条件
    ///
    /// # Arguments
    /// * `rule` - 条件节点
    /// * `field_value` - 从上下文中获取的字段值，`None` 表示字段不存在
    pub fn evaluate(rule: &Rule, field_value: Option<&Value>) -> Result<bool> {
        // 存在性检查不参与类型检查和值转换
        match rule.operator {
            Operator::Exists => return Ok(field_value.is_some()),
            Operator::NotExists => return Ok(field_value.is_none()),
            _ => {}
        }

        let raw =
            field_value.ok_or_else(|| RuleError::FieldNotFound(rule.field_name.clone()))?;

        if !is_operator_allowed(rule.operator, rule.field_type) {
            return Err(RuleError::InvalidOperator {
                operator: rule.operator,
                field_type: rule.field_type,
            });
        }

        let left = coerce(raw, rule.field_type)
            .map_err(|e| RuleError::type_mismatch(&rule.field_name, e.to_string()))?;

        // 缺省的 value 不等同于显式 null
        let literal = rule.value.as_ref();
        let right = match literal {
            Some(literal) => Self::literal_operand(rule, literal)?,
            None => None,
        };

        match rule.operator {
            Operator::Equals => Ok(right == Some(left)),
            Operator::NotEquals => Ok(right != Some(left)),
            Operator::GreaterThan => Self::compare(rule, left, right, |a, b| a > b),
            Operator::GreaterOrEqual => Self::compare(rule, left, right, |a, b| a >= b),
            Operator::LessThan => Self::compare(rule, left, right, |a, b| a < b),
            Operator::LessOrEqual => Self::compare(rule, left, right, |a, b| a <= b),
            Operator::In => Self::in_list(rule, left, literal),
            Operator::NotIn => Self::in_list(rule, left, literal).map(|r| !r),
            Operator::Contains => {
                Ok(Self::text_operands(left, literal).is_some_and(|(s, sub)| s.contains(sub)))
            }
            Operator::NotContains => {
                Ok(Self::text_operands(left, literal).is_some_and(|(s, sub)| !s.contains(sub)))
            }
            Operator::StartsWith => Ok(Self::text_operands(left, literal)
                .is_some_and(|(s, prefix)| s.starts_with(prefix))),
            Operator::EndsWith => Ok(Self::text_operands(left, literal)
                .is_some_and(|(s, suffix)| s.ends_with(suffix))),
            // 字段已确认存在
            Operator::Exists => Ok(true),
            Operator::NotExists => Ok(false),
        }
    }

    /// 规则字面量的比较形式：`Date` 的字符串解析为毫秒时间戳，其余保持原样
    fn literal_operand<'v>(rule: &Rule, literal: &'v Value) -> Result<Option<Comparable<'v>>> {
        match (rule.field_type, literal) {
            (FieldType::Date, Value::String(s)) => parse_date(s)
                .map(|ms| Some(Comparable::Number(ms)))
                .ok_or_else(|| {
                    RuleError::type_mismatch(&rule.field_name, format!("invalid date value '{}'", s))
                }),
            _ => Ok(Comparable::from_literal(literal)),
        }
    }

    /// 数值比较
    fn compare<F>(
        rule: &Rule,
        left: Comparable<'_>,
        right: Option<Comparable<'_>>,
        cmp: F,
    ) -> Result<bool>
    where
        F: Fn(f64, f64) -> bool,
    {
        let expected_num = right.and_then(|r| r.as_number()).ok_or_else(|| {
            RuleError::type_mismatch(
                &rule.field_name,
                format!("operator {} requires a numeric value", rule.operator),
            )
        })?;

        // 转换后只剩 null 不是数值，null 不满足任何比较
        let Some(field_num) = left.as_number() else {
            return Ok(false);
        };

        Ok(cmp(field_num, expected_num))
    }

    /// 列表包含检查 (in / not_in)
    fn in_list(rule: &Rule, left: Comparable<'_>, literal: Option<&Value>) -> Result<bool> {
        let items = literal.and_then(Value::as_array).ok_or_else(|| {
            let label = if rule.operator == Operator::In { "IN" } else { "NOT_IN" };
            RuleError::type_mismatch(
                &rule.field_name,
                format!("{} operator requires value to be an array", label),
            )
        })?;

        Ok(items
            .iter()
            .any(|item| Self::list_item(rule.field_type, item) == Some(left)))
    }

    fn list_item(field_type: FieldType, item: &Value) -> Option<Comparable<'_>> {
        match (field_type, item) {
            (FieldType::Date, Value::String(s)) => parse_date(s).map(Comparable::Number),
            _ => Comparable::from_literal(item),
        }
    }

    /// 字符串操作要求两侧都是字符串，否则视为不匹配
    fn text_operands<'l, 'v>(
        left: Comparable<'l>,
        literal: Option<&'v Value>,
    ) -> Option<(&'l str, &'v str)> {
        Some((left.as_text()?, literal?.as_str()?))
    }
}

/// 规则树遍历器
///
/// 持有上下文、诊断接收器和可选的评估追踪。
pub(crate) struct NodeWalker<'a> {
    context: &'a PropertyBag,
    sink: &'a mut dyn DiagnosticSink,
    trace: Option<Vec<String>>,
}

impl<'a> NodeWalker<'a> {
    pub(crate) fn new(context: &'a PropertyBag, sink: &'a mut dyn DiagnosticSink) -> Self {
        Self {
            context,
            sink,
            trace: None,
        }
    }

    pub(crate) fn with_trace(mut self) -> Self {
        self.trace = Some(Vec::new());
        self
    }

    pub(crate) fn into_trace(self) -> Vec<String> {
        self.trace.unwrap_or_default()
    }

    /// 递归评估规则节点
    pub(crate) fn walk(&mut self, node: &RuleNode, path: &str) -> bool {
        match node {
            RuleNode::Group(group) => self.walk_group(group, path),
            RuleNode::Rule(rule) => self.walk_rule(rule, path),
            RuleNode::Malformed(_) => {
                self.report(RuleError::InvalidRule("Invalid rule node".to_string()), path);
                self.record(|| format!("{}: invalid node => NOT_MATCHED", display_path(path)));
                false
            }
        }
    }

    /// 评估条件节点
    fn walk_rule(&mut self, rule: &Rule, path: &str) -> bool {
        let field_value = self.context.get_field(&rule.field_name);

        let matched = match ConditionEvaluator::evaluate(rule, field_value) {
            Ok(matched) => matched,
            Err(e) => {
                self.report(e, path);
                false
            }
        };

        self.record(|| {
            let value = rule
                .value
                .as_ref()
                .map(Value::to_string)
                .unwrap_or_default();
            format!(
                "{}: {} {} {} => {}",
                display_path(path),
                rule.field_name,
                rule.operator,
                value,
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            )
        });

        matched
    }

    /// 评估逻辑组节点（不短路）
    fn walk_group(&mut self, group: &RuleGroup, path: &str) -> bool {
        if group.conditions.is_empty() {
            self.report(RuleError::EmptyConditions, path);
            // 空 AND 为真，空 OR 为假
            let matched = group.logical_operator == LogicalOperator::And;
            self.record(|| {
                format!(
                    "{}: 空 {} 组 => {}",
                    display_path(path),
                    group.logical_operator,
                    if matched { "MATCHED" } else { "NOT_MATCHED" }
                )
            });
            return matched;
        }

        self.record(|| {
            format!(
                "{}: 开始评估 {} 组 (共 {} 个子节点)",
                display_path(path),
                group.logical_operator,
                group.conditions.len()
            )
        });

        let results: Vec<bool> = group
            .conditions
            .iter()
            .enumerate()
            .map(|(i, child)| self.walk(child, &condition_path(path, i)))
            .collect();

        let matched = match group.logical_operator {
            LogicalOperator::And => results.iter().all(|r| *r),
            LogicalOperator::Or => results.iter().any(|r| *r),
        };

        self.record(|| {
            format!(
                "{}: {} 组 {}",
                display_path(path),
                group.logical_operator,
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            )
        });

        matched
    }

    fn report(&mut self, error: RuleError, path: &str) {
        let diagnostic = Diagnostic::from_error(error, path);
        debug!(
            code = %diagnostic.code,
            path = %diagnostic.path,
            message = %diagnostic.message,
            "rule evaluation diagnostic"
        );
        self.sink.report(diagnostic);
    }

    fn record(&mut self, line: impl FnOnce() -> String) {
        if let Some(trace) = self.trace.as_mut() {
            trace.push(line());
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "root" } else { path }
}
