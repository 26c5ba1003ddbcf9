//! 规则执行器
//!
//! 在评估器之上收集诊断、计时，并可选地记录逐节点的评估追踪。
//! 结果与 [`crate::evaluate`] 完全一致。

use crate::evaluator::NodeWalker;
use crate::models::{EvaluationResult, PropertyBag, RuleNode};
use std::time::Instant;
use tracing::trace;

/// 规则执行器
pub struct RuleExecutor {
    /// 是否记录详细评估追踪
    trace_enabled: bool,
}

impl RuleExecutor {
    pub fn new() -> Self {
        Self {
            trace_enabled: false,
        }
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    /// 执行规则评估
    pub fn execute(&self, node: &RuleNode, context: &PropertyBag) -> EvaluationResult {
        let start = Instant::now();

        let mut diagnostics = Vec::new();
        let mut walker = NodeWalker::new(context, &mut diagnostics);
        if self.trace_enabled {
            walker = walker.with_trace();
        }

        let matched = walker.walk(node, "");
        let evaluation_trace = walker.into_trace();
        let evaluation_time_us = start.elapsed().as_micros() as u64;

        trace!(
            matched,
            diagnostics = diagnostics.len(),
            evaluation_time_us,
            "rule tree evaluated"
        );

        EvaluationResult {
            matched,
            diagnostics,
            evaluation_trace,
            evaluation_time_us,
        }
    }
}

impl Default for RuleExecutor {
    fn default() -> Self {
        Self::new()
    }
}
