//! 规则引擎错误类型
//!
//! `RuleError` 是库内部的错误枚举；评估过程中的每个错误都会被降级为
//! 一条 [`Diagnostic`]，通过 [`DiagnosticSink`] 交给调用方，而不会中断评估。

use crate::operators::{FieldType, Operator};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则解析失败: {0}")]
    ParseError(String),

    #[error("Field '{0}' not found")]
    FieldNotFound(String),

    #[error("Type mismatch for field '{field}': {detail}")]
    TypeMismatch { field: String, detail: String },

    #[error("Operator {operator} not allowed for field type {field_type}")]
    InvalidOperator {
        operator: Operator,
        field_type: FieldType,
    },

    #[error("{0}")]
    InvalidRule(String),

    #[error("RuleGroup has empty conditions")]
    EmptyConditions,

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RuleError {
    pub fn type_mismatch(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            detail: detail.into(),
        }
    }

    /// 错误对应的诊断码
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::FieldNotFound(_) => ErrorCode::FieldNotFound,
            Self::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Self::InvalidOperator { .. } => ErrorCode::InvalidOperator,
            Self::EmptyConditions => ErrorCode::EmptyConditions,
            Self::ParseError(_) | Self::InvalidRule(_) | Self::JsonError(_) => {
                ErrorCode::InvalidRule
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;

/// 诊断类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// 数据与规则声明不一致
    Validation,
    /// 规则树本身的结构问题
    Structure,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Structure => write!(f, "structure"),
        }
    }
}

/// 诊断码（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FieldNotFound,
    TypeMismatch,
    InvalidOperator,
    InvalidRule,
    EmptyConditions,
}

impl ErrorCode {
    pub const fn id(self) -> &'static str {
        match self {
            Self::FieldNotFound => "FIELD_NOT_FOUND",
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::InvalidOperator => "INVALID_OPERATOR",
            Self::InvalidRule => "INVALID_RULE",
            Self::EmptyConditions => "EMPTY_CONDITIONS",
        }
    }

    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::FieldNotFound | Self::TypeMismatch | Self::InvalidOperator => {
                ErrorCategory::Validation
            }
            Self::InvalidRule | Self::EmptyConditions => ErrorCategory::Structure,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ErrorCode", 2)?;
        state.serialize_field("id", self.id())?;
        state.serialize_field("category", &self.category())?;
        state.end()
    }
}

/// 评估诊断
///
/// `path` 与校验器使用同一种定位格式，根节点为空串。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("[{code}] {message}")]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub message: String,
    pub path: String,
}

impl Diagnostic {
    pub fn new(code: ErrorCode, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    pub(crate) fn from_error(error: RuleError, path: &str) -> Self {
        Self::new(error.code(), error.to_string(), path)
    }
}

impl From<RuleError> for Diagnostic {
    fn from(error: RuleError) -> Self {
        Self::from_error(error, "")
    }
}

/// 诊断接收器
///
/// 评估过程按先序、从左到右的顺序调用 `report`，返回值不受其影响。
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// 丢弃所有诊断
#[derive(Debug, Clone, Copy, Default)]
pub struct Ignore;

impl DiagnosticSink for Ignore {
    fn report(&mut self, _diagnostic: Diagnostic) {}
}

/// 将闭包包装为诊断接收器
pub struct FnSink<F>(pub F);

impl<F> DiagnosticSink for FnSink<F>
where
    F: FnMut(Diagnostic),
{
    fn report(&mut self, diagnostic: Diagnostic) {
        (self.0)(diagnostic)
    }
}
