//! 规则树校验器
//!
//! 与评估器相互独立：不需要上下文，遍历整棵树并收集全部结构和类型错误，
//! 每个错误都带有节点路径。与评估器不同，空逻辑组在这里总是错误。

use crate::coercion::parse_date;
use crate::compatibility::is_operator_allowed;
use crate::models::{condition_path, Rule, RuleGroup, RuleNode};
use crate::operators::{FieldType, LogicalOperator, Operator};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::debug;

/// 校验错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// 校验结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(Vec<ValidationError>),
}

impl ValidationResult {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        if errors.is_empty() {
            Self::Valid
        } else {
            Self::Invalid(errors)
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn errors(&self) -> &[ValidationError] {
        match self {
            Self::Valid => &[],
            Self::Invalid(errors) => errors,
        }
    }
}

impl Serialize for ValidationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Valid => {
                let mut state = serializer.serialize_struct("ValidationResult", 1)?;
                state.serialize_field("valid", &true)?;
                state.end()
            }
            Self::Invalid(errors) => {
                let mut state = serializer.serialize_struct("ValidationResult", 2)?;
                state.serialize_field("valid", &false)?;
                state.serialize_field("errors", errors)?;
                state.end()
            }
        }
    }
}

/// 校验已解析的规则树
pub fn validate(node: &RuleNode) -> ValidationResult {
    if let RuleNode::Malformed(value) = node {
        return validate_value(value);
    }

    let mut errors = Vec::new();
    validate_node(node, "", &mut errors);
    finish(errors)
}

/// 校验未经处理的 JSON 规则树
pub fn validate_value(value: &Value) -> ValidationResult {
    let Some(object) = value.as_object() else {
        return finish(vec![ValidationError::new("", "Rule must be a non-null object")]);
    };

    let mut errors = Vec::new();
    match RuleNode::from_value(value.clone()) {
        RuleNode::Malformed(_) => validate_raw(object, "", &mut errors),
        node => validate_node(&node, "", &mut errors),
    }
    finish(errors)
}

fn finish(errors: Vec<ValidationError>) -> ValidationResult {
    if !errors.is_empty() {
        debug!(errors = errors.len(), "rule tree validation failed");
    }
    ValidationResult::from_errors(errors)
}

fn validate_node(node: &RuleNode, path: &str, errors: &mut Vec<ValidationError>) {
    match node {
        RuleNode::Group(group) => validate_group(group, path, errors),
        RuleNode::Rule(rule) => validate_rule(&RuleFields::from_rule(rule), path, errors),
        RuleNode::Malformed(value) => match value
            .as_object()
            .filter(|o| is_group_shaped(o) || is_rule_shaped(o))
        {
            Some(object) => validate_raw(object, path, errors),
            None => errors.push(ValidationError::new(
                path,
                "Condition must be a Rule or RuleGroup",
            )),
        },
    }
}

fn validate_group(group: &RuleGroup, path: &str, errors: &mut Vec<ValidationError>) {
    validate_conditions(group.conditions.iter(), path, errors);
}

fn validate_conditions<'a>(
    conditions: impl ExactSizeIterator<Item = &'a RuleNode>,
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    if conditions.len() == 0 {
        let path = if path.is_empty() { "conditions" } else { path };
        errors.push(ValidationError::new(
            path,
            "RuleGroup must have at least one condition",
        ));
        return;
    }

    for (i, child) in conditions.enumerate() {
        validate_node(child, &condition_path(path, i), errors);
    }
}

fn is_group_shaped(object: &Map<String, Value>) -> bool {
    object.contains_key("logicalOperator") && object.contains_key("conditions")
}

fn is_rule_shaped(object: &Map<String, Value>) -> bool {
    ["fieldName", "fieldType", "operator"]
        .iter()
        .all(|key| object.contains_key(*key))
}

/// 校验无法直接解析为类型化节点的对象
fn validate_raw(object: &Map<String, Value>, path: &str, errors: &mut Vec<ValidationError>) {
    if is_group_shaped(object) {
        validate_raw_group(object, path, errors);
    } else if is_rule_shaped(object) {
        validate_rule(&RuleFields::from_object(object), path, errors);
    } else {
        errors.push(ValidationError::new(
            path,
            "Invalid rule node: must be Rule or RuleGroup",
        ));
    }
}

fn validate_raw_group(object: &Map<String, Value>, path: &str, errors: &mut Vec<ValidationError>) {
    let logical_operator = object.get("logicalOperator");
    let parsed = logical_operator
        .and_then(Value::as_str)
        .map(LogicalOperator::from_str);
    if !matches!(parsed, Some(Ok(_))) {
        let shown = logical_operator.map(display_raw).unwrap_or_default();
        errors.push(ValidationError::new(
            path,
            format!("Invalid logicalOperator: {}", shown),
        ));
    }

    match object.get("conditions") {
        Some(Value::Array(items)) => {
            let children: Vec<RuleNode> = items.iter().cloned().map(RuleNode::from_value).collect();
            validate_conditions(children.iter(), path, errors);
        }
        _ => errors.push(ValidationError::new(path, "RuleGroup conditions must be an array")),
    }
}

/// 条件中某个枚举字段的解析状态
#[derive(Debug, Clone, Copy)]
enum Slot<'a, T> {
    Missing,
    Unknown(&'a str),
    Known(T),
}

impl<'a, T: FromStr> Slot<'a, T> {
    fn parse(value: Option<&'a Value>) -> Self {
        match value.and_then(Value::as_str) {
            None | Some("") => Self::Missing,
            Some(s) => s.parse().map_or(Self::Unknown(s), Self::Known),
        }
    }
}

impl<T: Copy> Slot<'_, T> {
    fn known(&self) -> Option<T> {
        match self {
            Self::Known(t) => Some(*t),
            Self::Missing | Self::Unknown(_) => None,
        }
    }
}

/// 条件字段的统一视图，类型化条件和原始对象都转换为它再校验
struct RuleFields<'a> {
    field_name: Option<&'a str>,
    field_type: Slot<'a, FieldType>,
    operator: Slot<'a, Operator>,
    value: Option<&'a Value>,
}

impl<'a> RuleFields<'a> {
    fn from_rule(rule: &'a Rule) -> Self {
        Self {
            field_name: Some(&rule.field_name),
            field_type: Slot::Known(rule.field_type),
            operator: Slot::Known(rule.operator),
            value: rule.value.as_ref(),
        }
    }

    fn from_object(object: &'a Map<String, Value>) -> Self {
        Self {
            field_name: object.get("fieldName").and_then(Value::as_str),
            field_type: Slot::parse(object.get("fieldType")),
            operator: Slot::parse(object.get("operator")),
            value: object.get("value"),
        }
    }
}

/// 条件校验：各项检查相互独立，全部累积
fn validate_rule(fields: &RuleFields<'_>, path: &str, errors: &mut Vec<ValidationError>) {
    if fields.field_name.is_none_or(str::is_empty) {
        errors.push(ValidationError::new(path, "Rule must have a non-empty fieldName"));
    }

    match fields.field_type {
        Slot::Missing => errors.push(ValidationError::new(path, "Rule must have a fieldType")),
        Slot::Unknown(s) => {
            errors.push(ValidationError::new(path, format!("Invalid fieldType: {}", s)))
        }
        Slot::Known(_) => {}
    }

    match fields.operator {
        Slot::Missing => errors.push(ValidationError::new(path, "Rule must have an operator")),
        Slot::Unknown(s) => {
            errors.push(ValidationError::new(path, format!("Invalid operator: {}", s)))
        }
        Slot::Known(_) => {}
    }

    let field_type = fields.field_type.known();
    let operator = fields.operator.known();

    if let (Some(field_type), Some(operator)) = (field_type, operator) {
        if !is_operator_allowed(operator, field_type) {
            errors.push(ValidationError::new(
                path,
                format!(
                    "Operator '{}' is not allowed for fieldType '{}'",
                    operator, field_type
                ),
            ));
        }
    }

    let presence_check = operator.is_some_and(Operator::is_presence_check);
    if !presence_check && fields.value.is_none() {
        errors.push(ValidationError::new(
            path,
            "Rule must have a value (except for EXISTS/NOT_EXISTS)",
        ));
    }

    if let (Some(field_type), Some(operator)) = (field_type, operator) {
        let value = fields.value.unwrap_or(&Value::Null);
        validate_rule_value(value, field_type, operator, path, errors);
    }
}

/// 按字段类型和操作符检查比较值的形状
fn validate_rule_value(
    value: &Value,
    field_type: FieldType,
    operator: Operator,
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    if operator.is_presence_check() {
        return;
    }

    if operator.is_membership() {
        let Some(items) = value.as_array() else {
            errors.push(ValidationError::new(
                path,
                "Value must be an array for IN/NOT_IN operator",
            ));
            return;
        };
        match field_type {
            FieldType::Number if !items.iter().all(Value::is_number) => {
                errors.push(ValidationError::new(
                    path,
                    "IN/NOT_IN value must be number[] for fieldType number",
                ));
            }
            FieldType::String if !items.iter().all(Value::is_string) => {
                errors.push(ValidationError::new(
                    path,
                    "IN/NOT_IN value must be string[] for fieldType string",
                ));
            }
            // Boolean / Date / DateUnix 不检查数组元素
            _ => {}
        }
        return;
    }

    let message = match field_type {
        FieldType::Number if !value.is_number() => Some("Value must be number for fieldType number"),
        FieldType::String if !value.is_string() => Some("Value must be string for fieldType string"),
        FieldType::Boolean if !value.is_boolean() => {
            Some("Value must be boolean for fieldType boolean")
        }
        FieldType::Date => match value.as_str() {
            None => Some("Value must be string (ISO date) for fieldType date"),
            Some(s) if parse_date(s).is_none() => {
                Some("Value must be a valid ISO date string for fieldType date")
            }
            Some(_) => None,
        },
        FieldType::DateUnix if !value.is_number() => {
            Some("Value must be number for fieldType date_unix")
        }
        FieldType::Number | FieldType::String | FieldType::Boolean | FieldType::DateUnix => None,
    };

    if let Some(message) = message {
        errors.push(ValidationError::new(path, message));
    }
}

fn display_raw(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
