//! 值转换
//!
//! 将上下文中取到的原始值按声明的字段类型转换为可直接比较的值。
//! 除日期解析外不做任何跨类型转换（数值字符串不会变成数值）。

use crate::operators::FieldType;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use thiserror::Error;

/// 原始值与字段类型不兼容
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected {expected}, got {actual}")]
pub struct Incompatible {
    pub expected: FieldType,
    pub actual: &'static str,
}

/// 可比较值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    Text(&'a str),
}

impl<'a> Comparable<'a> {
    /// 规则字面量的原生形式；数组和对象没有可比较形式
    pub fn from_literal(value: &'a Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Self::Number),
            Value::String(s) => Some(Self::Text(s)),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&'a str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// 按字段类型转换原始值
///
/// null 原样通过；`Date` 要求可解析的日期字符串，结果为毫秒时间戳；
/// `DateUnix` 要求数值；其余类型要求原生类型一致。
pub fn coerce(raw: &Value, field_type: FieldType) -> Result<Comparable<'_>, Incompatible> {
    if raw.is_null() {
        return Ok(Comparable::Null);
    }

    let coerced = match field_type {
        FieldType::Date => raw.as_str().and_then(parse_date).map(Comparable::Number),
        FieldType::DateUnix | FieldType::Number => raw.as_f64().map(Comparable::Number),
        FieldType::String => raw.as_str().map(Comparable::Text),
        FieldType::Boolean => raw.as_bool().map(Comparable::Bool),
    };

    coerced.ok_or(Incompatible {
        expected: field_type,
        actual: type_name(raw),
    })
}

/// 解析日历日期，返回 UTC 毫秒时间戳
///
/// 支持 RFC 3339、不带时区的日期时间（按 UTC）以及纯日期。
pub fn parse_date(s: &str) -> Option<f64> {
    // 尝试解析 ISO 8601 格式
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis() as f64);
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc().timestamp_millis() as f64);
        }
    }

    // 尝试解析纯日期格式
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis() as f64)
}

/// 获取值的类型名称
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_passes_through() {
        for field_type in FieldType::ALL {
            assert_eq!(coerce(&Value::Null, field_type).unwrap(), Comparable::Null);
        }
    }

    #[test]
    fn test_native_kinds() {
        assert_eq!(
            coerce(&json!(18), FieldType::Number).unwrap(),
            Comparable::Number(18.0)
        );
        assert_eq!(
            coerce(&json!("KR"), FieldType::String).unwrap(),
            Comparable::Text("KR")
        );
        assert_eq!(
            coerce(&json!(true), FieldType::Boolean).unwrap(),
            Comparable::Bool(true)
        );
        assert_eq!(
            coerce(&json!(1_700_000_000_000_i64), FieldType::DateUnix).unwrap(),
            Comparable::Number(1_700_000_000_000.0)
        );
    }

    #[test]
    fn test_no_cross_type_coercion() {
        assert!(coerce(&json!("18"), FieldType::Number).is_err());
        assert!(coerce(&json!(18), FieldType::String).is_err());
        assert!(coerce(&json!("true"), FieldType::Boolean).is_err());
        assert!(coerce(&json!("1700000000000"), FieldType::DateUnix).is_err());
        assert!(coerce(&json!(1_700_000_000_000_i64), FieldType::Date).is_err());
        assert_eq!(
            coerce(&json!([1, 2]), FieldType::Number).unwrap_err().to_string(),
            "expected number, got array"
        );
    }

    #[test]
    fn test_date_parsing() {
        assert_eq!(
            coerce(&json!("1970-01-01T00:00:01Z"), FieldType::Date).unwrap(),
            Comparable::Number(1000.0)
        );
        assert_eq!(parse_date("1970-01-02"), Some(86_400_000.0));
        assert_eq!(parse_date("1970-01-01T00:00:00.250"), Some(250.0));
        assert_eq!(parse_date("1970-01-01T09:00:00+09:00"), Some(0.0));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2024-13-45"), None);
        assert!(coerce(&json!("yesterday"), FieldType::Date).is_err());
    }

    #[test]
    fn test_literal_forms() {
        assert_eq!(Comparable::from_literal(&json!(null)), Some(Comparable::Null));
        assert_eq!(
            Comparable::from_literal(&json!("a")).and_then(|c| c.as_text()),
            Some("a")
        );
        assert_eq!(Comparable::from_literal(&json!(["a"])), None);
        assert_eq!(Comparable::from_literal(&json!({"a": 1})), None);
    }
}
