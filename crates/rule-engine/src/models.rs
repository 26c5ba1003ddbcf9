//! 规则引擎领域模型

use crate::error::{Diagnostic, Result};
use crate::operators::{FieldType, LogicalOperator, Operator};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 规则比较值：字符串、数值、布尔、null 或字符串/数值数组
pub type RuleValue = Value;

/// 规则节点（逻辑组、条件，或无法识别的节点）
///
/// 反序列化按顺序尝试：含 `logicalOperator` + `conditions` 的为逻辑组，
/// 含 `fieldName` + `fieldType` + `operator` 的为条件，其余原样保留在
/// `Malformed` 中，由评估器和校验器按节点报告。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleNode {
    Group(RuleGroup),
    Rule(Rule),
    Malformed(Value),
}

impl RuleNode {
    /// 从任意 JSON 构建节点，不会失败
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<RuleNode>(value.clone()) {
            Ok(node) => node,
            Err(_) => Self::Malformed(value),
        }
    }

    /// 从 JSON 字符串解析，只有 JSON 语法错误才会失败
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self::from_value(value))
    }
}

impl From<Rule> for RuleNode {
    fn from(rule: Rule) -> Self {
        Self::Rule(rule)
    }
}

impl From<RuleGroup> for RuleNode {
    fn from(group: RuleGroup) -> Self {
        Self::Group(group)
    }
}

/// 条件节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// 点号分隔的字段路径，如 "address.city"
    pub field_name: String,
    pub field_type: FieldType,
    pub operator: Operator,
    /// `None` 表示缺省，`Some(Value::Null)` 表示显式 null
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<RuleValue>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Rule {
    pub fn new(
        field_name: impl Into<String>,
        field_type: FieldType,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            field_type,
            operator,
            value: Some(value.into()),
        }
    }

    /// 存在性检查条件，不携带比较值
    pub fn presence(field_name: impl Into<String>, field_type: FieldType, exists: bool) -> Self {
        Self {
            field_name: field_name.into(),
            field_type,
            operator: if exists {
                Operator::Exists
            } else {
                Operator::NotExists
            },
            value: None,
        }
    }
}

/// 逻辑组节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroup {
    pub logical_operator: LogicalOperator,
    pub conditions: Vec<RuleNode>,
}

impl RuleGroup {
    pub fn new(logical_operator: LogicalOperator, conditions: Vec<RuleNode>) -> Self {
        Self {
            logical_operator,
            conditions,
        }
    }

    pub fn and(conditions: Vec<RuleNode>) -> Self {
        Self::new(LogicalOperator::And, conditions)
    }

    pub fn or(conditions: Vec<RuleNode>) -> Self {
        Self::new(LogicalOperator::Or, conditions)
    }
}

/// 属性包 - 提供给规则引擎的数据
#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    data: Value,
}

impl PropertyBag {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// 从 JSON 对象创建
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let data: Value = serde_json::from_str(json)?;
        Ok(Self { data })
    }

    /// 获取字段值（支持点号分隔的路径，如 "user.profile.age"）
    ///
    /// 中间任一层缺失或为 null 时视为不存在；末端的 null 视为存在。
    pub fn get_field(&self, path: &str) -> Option<&Value> {
        let mut current = &self.data;

        for part in path.split('.') {
            match current {
                Value::Object(map) => {
                    current = map.get(part)?;
                }
                Value::Array(arr) => {
                    // 支持数组索引访问，如 "items.0.name"
                    let index: usize = part.parse().ok()?;
                    current = arr.get(index)?;
                }
                _ => return None,
            }
        }

        Some(current)
    }

    /// 获取底层数据
    pub fn data(&self) -> &Value {
        &self.data
    }
}

impl From<Value> for PropertyBag {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}

/// 子节点路径：根节点为空串，子节点为 `conditions[i]`，更深层用 `.` 连接
pub fn condition_path(parent: &str, index: usize) -> String {
    if parent.is_empty() {
        format!("conditions[{}]", index)
    } else {
        format!("{}.conditions[{}]", parent, index)
    }
}

/// 评估结果
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub matched: bool,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub evaluation_trace: Vec<String>,
    pub evaluation_time_us: u64,
}
