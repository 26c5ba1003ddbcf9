//! 操作符与字段类型兼容矩阵
//!
//! 评估器（软失败）与校验器（硬失败）共用此处的判断，两者不能出现分歧。

use crate::operators::{FieldType, Operator};

/// 字段类型是否支持有序比较
const fn is_ordered(field_type: FieldType) -> bool {
    match field_type {
        FieldType::Number | FieldType::Date | FieldType::DateUnix => true,
        FieldType::String | FieldType::Boolean => false,
    }
}

/// 判断操作符是否可用于给定字段类型
pub const fn is_operator_allowed(operator: Operator, field_type: FieldType) -> bool {
    match operator {
        Operator::Exists
        | Operator::NotExists
        | Operator::Equals
        | Operator::NotEquals
        | Operator::In
        | Operator::NotIn => true,
        Operator::GreaterThan
        | Operator::GreaterOrEqual
        | Operator::LessThan
        | Operator::LessOrEqual => is_ordered(field_type),
        Operator::Contains | Operator::NotContains | Operator::StartsWith | Operator::EndsWith => {
            matches!(field_type, FieldType::String)
        }
    }
}

/// 字段类型可用的全部操作符，按声明顺序排列
pub fn allowed_operators(field_type: FieldType) -> Vec<Operator> {
    Operator::ALL
        .into_iter()
        .filter(|op| is_operator_allowed(*op, field_type))
        .collect()
}
