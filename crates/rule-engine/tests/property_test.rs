//! 规则引擎性质测试
//!
//! 对任意 JSON 规则树和上下文，评估与校验都必须正常返回；
//! 通过校验的规则树在类型一致的上下文上不会产生类型或操作符诊断。

use proptest::prelude::*;
use rule_engine::{
    evaluate_with, is_operator_allowed, validate, validate_value, Diagnostic, ErrorCode,
    FieldType, Operator, PropertyBag, Rule, RuleGroup, RuleNode,
};
use serde_json::{json, Map, Value};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        prop::sample::select(vec![
            "AND", "OR", "==", ">=", "in", "exists", "string", "number", "date", "age",
            "2024-01-01", "",
        ])
        .prop_map(|s| Value::String(s.to_string())),
    ];

    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
            prop::collection::vec(
                (
                    prop::sample::select(vec![
                        "logicalOperator",
                        "conditions",
                        "fieldName",
                        "fieldType",
                        "operator",
                        "value",
                        "age",
                    ]),
                    inner
                ),
                0..5
            )
            .prop_map(|entries| {
                let map: Map<String, Value> = entries
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect();
                Value::Object(map)
            }),
        ]
    })
}

fn arb_field_type() -> impl Strategy<Value = FieldType> {
    prop::sample::select(FieldType::ALL.to_vec())
}

fn arb_operator() -> impl Strategy<Value = Operator> {
    prop::sample::select(Operator::ALL.to_vec())
}

/// 与字段类型一致的上下文值
fn sample_value(field_type: FieldType) -> Value {
    match field_type {
        FieldType::String => json!("seoul"),
        FieldType::Number => json!(42),
        FieldType::Boolean => json!(true),
        FieldType::Date => json!("2024-06-01T00:00:00Z"),
        FieldType::DateUnix => json!(1_717_200_000_000_i64),
    }
}

/// 规则字面量候选：既有合法值也有非法值
fn arb_literal(field_type: FieldType) -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(sample_value(field_type)),
        Just(json!([sample_value(field_type)])),
        Just(json!("not-a-date")),
        Just(json!(7)),
        Just(Value::Null),
        Just(json!(["a", 1])),
    ]
}

fn arb_rule() -> impl Strategy<Value = Rule> {
    (arb_field_type(), arb_operator()).prop_flat_map(|(field_type, operator)| {
        arb_literal(field_type).prop_map(move |value| Rule {
            field_name: format!("f_{}", field_type),
            field_type,
            operator,
            value: Some(value),
        })
    })
}

/// 只由通过校验的条件组成的规则树
fn arb_valid_tree() -> impl Strategy<Value = RuleNode> {
    arb_rule()
        .prop_filter("rule must validate", |rule| {
            validate(&RuleNode::Rule(rule.clone())).is_valid()
        })
        .prop_map(RuleNode::Rule)
        .prop_recursive(3, 24, 4, |inner| {
            (any::<bool>(), prop::collection::vec(inner, 1..4)).prop_map(|(and, children)| {
                let group = if and {
                    RuleGroup::and(children)
                } else {
                    RuleGroup::or(children)
                };
                RuleNode::Group(group)
            })
        })
}

/// 每个字段类型对应一个字段，值与声明类型一致
fn typed_context() -> PropertyBag {
    let mut map = Map::new();
    for field_type in FieldType::ALL {
        map.insert(format!("f_{}", field_type), sample_value(field_type));
    }
    PropertyBag::new(Value::Object(map))
}

proptest! {
    #[test]
    fn evaluate_never_fails_on_arbitrary_input(tree in arb_json(), context in arb_json()) {
        let node = RuleNode::from_value(tree.clone());
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let _ = evaluate_with(&node, &PropertyBag::new(context), &mut diagnostics);
        let _ = validate_value(&tree);
        let _ = validate(&node);
    }

    #[test]
    fn valid_trees_evaluate_without_type_errors(tree in arb_valid_tree()) {
        prop_assert!(validate(&tree).is_valid());

        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let _ = evaluate_with(&tree, &typed_context(), &mut diagnostics);

        prop_assert!(diagnostics
            .iter()
            .all(|d| d.code != ErrorCode::TypeMismatch && d.code != ErrorCode::InvalidOperator));
    }

    #[test]
    fn validator_agrees_with_matrix(rule in arb_rule()) {
        let allowed = is_operator_allowed(rule.operator, rule.field_type);
        let result = validate(&RuleNode::Rule(rule.clone()));
        let flagged = result
            .errors()
            .iter()
            .any(|e| e.message.contains("is not allowed for fieldType"));
        prop_assert_eq!(flagged, !allowed);
    }
}
