//! 规则引擎命令行
//!
//! 校验规则树、对属性包评估规则树，或列出字段类型可用的操作符。

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rule_engine::{
    allowed_operators, validate, EvaluationResult, FieldType, PropertyBag, RuleExecutor, RuleNode,
};
use rule_engine_shared::config::{AppConfig, EvaluationConfig};
use rule_engine_shared::observability;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "rule-engine", version, about = "Evaluate and validate targeting rule trees")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 校验规则树，输出 {"valid": ...}
    Validate {
        /// 规则树 JSON 文件，`-` 表示标准输入
        tree: PathBuf,
    },
    /// 对属性包评估规则树
    Evaluate {
        /// 规则树 JSON 文件，`-` 表示标准输入
        tree: PathBuf,
        /// 属性包 JSON 文件，`-` 表示标准输入
        context: PathBuf,
        /// 记录逐节点评估追踪
        #[arg(long)]
        trace: bool,
    },
    /// 列出字段类型可用的操作符
    Operators {
        /// string | number | boolean | date | date_unix
        field_type: String,
    },
}

/// 命令执行结果对应的退出码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    Rejected,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Failure => ExitCode::from(1),
            Outcome::Rejected => ExitCode::from(2),
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = AppConfig::load("rule-engine").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    observability::init(&obs_config)?;

    let outcome = match cli.command {
        Command::Validate { tree } => run_validate(&tree)?,
        Command::Evaluate {
            tree,
            context,
            trace,
        } => {
            let mut evaluation = config.evaluation.clone();
            evaluation.trace_enabled |= trace;
            run_evaluate(&tree, &context, &evaluation)?
        }
        Command::Operators { field_type } => run_operators(&field_type)?,
    };

    Ok(outcome.into())
}

fn run_validate(tree_path: &Path) -> Result<Outcome> {
    let tree = read_json(tree_path)?;
    let result = validate(&RuleNode::from_value(tree));

    info!(
        tree = %tree_path.display(),
        valid = result.is_valid(),
        errors = result.errors().len(),
        "Validated rule tree"
    );
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(if result.is_valid() {
        Outcome::Success
    } else {
        Outcome::Failure
    })
}

fn run_evaluate(
    tree_path: &Path,
    context_path: &Path,
    evaluation: &EvaluationConfig,
) -> Result<Outcome> {
    let tree = RuleNode::from_value(read_json(tree_path)?);
    let context = PropertyBag::new(read_json(context_path)?);

    if evaluation.fail_on_invalid {
        let validation = validate(&tree);
        if !validation.is_valid() {
            warn!(
                tree = %tree_path.display(),
                errors = validation.errors().len(),
                "Refusing to evaluate invalid rule tree"
            );
            println!("{}", serde_json::to_string_pretty(&validation)?);
            return Ok(Outcome::Rejected);
        }
    }

    let result = evaluate_tree(&tree, &context, evaluation.trace_enabled);

    info!(
        tree = %tree_path.display(),
        matched = result.matched,
        diagnostics = result.diagnostics.len(),
        evaluation_time_us = result.evaluation_time_us,
        "Evaluated rule tree"
    );
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(if result.matched {
        Outcome::Success
    } else {
        Outcome::Failure
    })
}

fn evaluate_tree(tree: &RuleNode, context: &PropertyBag, trace: bool) -> EvaluationResult {
    let executor = if trace {
        RuleExecutor::new().with_trace()
    } else {
        RuleExecutor::new()
    };
    executor.execute(tree, context)
}

fn run_operators(field_type: &str) -> Result<Outcome> {
    let field_type: FieldType = field_type.parse()?;

    for operator in allowed_operators(field_type) {
        println!("{}", operator);
    }

    Ok(Outcome::Success)
}

/// 读取 JSON 文件，`-` 表示标准输入
fn read_json(path: &Path) -> Result<Value> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read standard input")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}
