//! 定向规则引擎
//!
//! 判断一组用户属性是否满足声明式、任意嵌套的布尔规则树：
//! - `evaluate` 递归评估规则树，永不失败，问题通过诊断接收器报告
//! - `validate` 独立校验规则树的结构和类型，返回带路径的全部错误
//! - 两者共用同一张操作符/字段类型兼容矩阵

pub mod coercion;
pub mod compatibility;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod models;
pub mod operators;
pub mod validator;

pub use compatibility::{allowed_operators, is_operator_allowed};
pub use error::{
    Diagnostic, DiagnosticSink, ErrorCategory, ErrorCode, FnSink, Ignore, Result, RuleError,
};
pub use evaluator::{evaluate, evaluate_with, ConditionEvaluator};
pub use executor::RuleExecutor;
pub use models::{EvaluationResult, PropertyBag, Rule, RuleGroup, RuleNode, RuleValue};
pub use operators::{FieldType, LogicalOperator, Operator};
pub use validator::{validate, validate_value, ValidationError, ValidationResult};
