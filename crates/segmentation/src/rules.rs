//! Rule grammar and evaluation logic for segment criteria.
//!
//! Evaluation is total: a comparison against a missing attribute, or one whose
//! operator does not apply to the attribute's type, is simply `false`.

use intel_core::types::HealthLabel;
use serde::{Deserialize, Serialize};

/// Deepest rule tree accepted at segment creation.
pub const MAX_RULE_DEPTH: usize = 32;

/// Whitelisted customer attributes a rule may reference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CustomerField {
    HealthLabel,
    CompositeScore,
    LifetimeSpend,
    OrderCount,
    DaysSinceLastOrder,
    SegmentTags,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    In,
}

/// Literal on the right-hand side of a comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RuleValue {
    Number(f64),
    Text(String),
    List(Vec<RuleValue>),
}

impl From<f64> for RuleValue {
    fn from(v: f64) -> Self {
        RuleValue::Number(v)
    }
}

impl From<u32> for RuleValue {
    fn from(v: u32) -> Self {
        RuleValue::Number(v as f64)
    }
}

impl From<&str> for RuleValue {
    fn from(v: &str) -> Self {
        RuleValue::Text(v.to_string())
    }
}

impl From<String> for RuleValue {
    fn from(v: String) -> Self {
        RuleValue::Text(v)
    }
}

impl From<HealthLabel> for RuleValue {
    fn from(v: HealthLabel) -> Self {
        RuleValue::Text(v.as_str().to_string())
    }
}

impl<T: Into<RuleValue>> From<Vec<T>> for RuleValue {
    fn from(v: Vec<T>) -> Self {
        RuleValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// A segment rule tree. Serialized with a `type` tag:
/// `{"type":"and","children":[{"type":"comparison","field":"order_count","op":"gte","value":3}]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleNode {
    Comparison {
        field: CustomerField,
        op: ComparisonOperator,
        value: RuleValue,
    },
    And {
        children: Vec<RuleNode>,
    },
    Or {
        children: Vec<RuleNode>,
    },
    Not {
        child: Box<RuleNode>,
    },
}

impl RuleNode {
    pub fn compare(field: CustomerField, op: ComparisonOperator, value: impl Into<RuleValue>) -> Self {
        RuleNode::Comparison {
            field,
            op,
            value: value.into(),
        }
    }

    pub fn all(children: Vec<RuleNode>) -> Self {
        RuleNode::And { children }
    }

    pub fn any(children: Vec<RuleNode>) -> Self {
        RuleNode::Or { children }
    }

    pub fn negate(child: RuleNode) -> Self {
        RuleNode::Not {
            child: Box::new(child),
        }
    }

    /// Height of the tree; a lone comparison has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            RuleNode::Comparison { .. } => 1,
            RuleNode::And { children } | RuleNode::Or { children } => {
                1 + children.iter().map(RuleNode::depth).max().unwrap_or(0)
            }
            RuleNode::Not { child } => 1 + child.depth(),
        }
    }

    /// Structural checks applied before a rule is persisted. Evaluation does
    /// not depend on these; it stays total for any tree.
    pub fn validate(&self) -> Result<(), String> {
        let depth = self.depth();
        if depth > MAX_RULE_DEPTH {
            return Err(format!(
                "rule depth {depth} exceeds maximum of {MAX_RULE_DEPTH}"
            ));
        }
        self.validate_comparisons()
    }

    fn validate_comparisons(&self) -> Result<(), String> {
        match self {
            RuleNode::Comparison { field, op, value } => match (op, value) {
                (ComparisonOperator::In, RuleValue::List(items)) => {
                    if items.iter().any(|i| matches!(i, RuleValue::List(_))) {
                        Err(format!("'in' on {field:?} must not contain nested lists"))
                    } else {
                        Ok(())
                    }
                }
                (ComparisonOperator::In, _) => {
                    Err(format!("'in' on {field:?} requires a list value"))
                }
                (_, RuleValue::List(_)) => {
                    Err(format!("{op:?} on {field:?} does not accept a list value"))
                }
                _ => Ok(()),
            },
            RuleNode::And { children } | RuleNode::Or { children } => children
                .iter()
                .try_for_each(RuleNode::validate_comparisons),
            RuleNode::Not { child } => child.validate_comparisons(),
        }
    }

    /// Evaluate against any attribute source. `And`/`Or` short-circuit
    /// left-to-right; empty `And` is true, empty `Or` is false.
    pub fn evaluate<S: AttributeSource + ?Sized>(&self, source: &S) -> bool {
        match self {
            RuleNode::Comparison { field, op, value } => {
                compare_values(&source.attribute(*field), op, value)
            }
            RuleNode::And { children } => children.iter().all(|c| c.evaluate(source)),
            RuleNode::Or { children } => children.iter().any(|c| c.evaluate(source)),
            RuleNode::Not { child } => !child.evaluate(source),
        }
    }
}

/// Resolved value of a customer attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue<'a> {
    Number(f64),
    Label(HealthLabel),
    Tags(&'a [String]),
    Missing,
}

/// Anything that can answer attribute lookups for rule evaluation.
pub trait AttributeSource {
    fn attribute(&self, field: CustomerField) -> AttributeValue<'_>;
}

#[allow(clippy::unnecessary_map_or)]
pub fn compare_values(
    actual: &AttributeValue<'_>,
    operator: &ComparisonOperator,
    expected: &RuleValue,
) -> bool {
    match operator {
        ComparisonOperator::Eq => equals(actual, expected).unwrap_or(false),
        ComparisonOperator::Neq => equals(actual, expected).map_or(false, |eq| !eq),
        ComparisonOperator::Gt => ordering(actual, expected).map_or(false, |o| o.is_gt()),
        ComparisonOperator::Gte => ordering(actual, expected).map_or(false, |o| o.is_ge()),
        ComparisonOperator::Lt => ordering(actual, expected).map_or(false, |o| o.is_lt()),
        ComparisonOperator::Lte => ordering(actual, expected).map_or(false, |o| o.is_le()),
        ComparisonOperator::Contains => contains(actual, expected),
        ComparisonOperator::In => match expected {
            RuleValue::List(items) => match actual {
                AttributeValue::Tags(tags) => tags.iter().any(|tag| {
                    items
                        .iter()
                        .any(|i| matches!(i, RuleValue::Text(t) if t.eq_ignore_ascii_case(tag)))
                }),
                _ => items.iter().any(|i| equals(actual, i).unwrap_or(false)),
            },
            _ => false,
        },
    }
}

/// `None` when the two sides are not comparable for equality.
fn equals(actual: &AttributeValue<'_>, expected: &RuleValue) -> Option<bool> {
    match (actual, expected) {
        (AttributeValue::Number(a), RuleValue::Number(e)) => Some(a == e),
        (AttributeValue::Label(a), RuleValue::Text(e)) => {
            HealthLabel::parse(e).map(|label| label == *a)
        }
        _ => None,
    }
}

fn ordering(actual: &AttributeValue<'_>, expected: &RuleValue) -> Option<std::cmp::Ordering> {
    match (actual, expected) {
        (AttributeValue::Number(a), RuleValue::Number(e)) => a.partial_cmp(e),
        (AttributeValue::Label(a), RuleValue::Text(e)) => {
            HealthLabel::parse(e).map(|label| a.cmp(&label))
        }
        _ => None,
    }
}

fn contains(actual: &AttributeValue<'_>, expected: &RuleValue) -> bool {
    match (actual, expected) {
        (AttributeValue::Tags(tags), RuleValue::Text(needle)) => {
            tags.iter().any(|t| t.eq_ignore_ascii_case(needle))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        tags: Vec<String>,
    }

    impl AttributeSource for Fixture {
        fn attribute(&self, field: CustomerField) -> AttributeValue<'_> {
            match field {
                CustomerField::HealthLabel => AttributeValue::Label(HealthLabel::Loyal),
                CustomerField::CompositeScore => AttributeValue::Number(65.0),
                CustomerField::LifetimeSpend => AttributeValue::Number(420.5),
                CustomerField::OrderCount => AttributeValue::Number(7.0),
                CustomerField::DaysSinceLastOrder => AttributeValue::Missing,
                CustomerField::SegmentTags => AttributeValue::Tags(&self.tags),
            }
        }
    }

    fn fixture() -> Fixture {
        Fixture {
            tags: vec!["wholesale".to_string(), "newsletter".to_string()],
        }
    }

    #[test]
    fn test_empty_and_or_identities() {
        let f = fixture();
        assert!(RuleNode::all(vec![]).evaluate(&f));
        assert!(!RuleNode::any(vec![]).evaluate(&f));
    }

    #[test]
    fn test_contains_on_numeric_is_false() {
        let f = fixture();
        let rule = RuleNode::compare(
            CustomerField::LifetimeSpend,
            ComparisonOperator::Contains,
            "42",
        );
        assert!(!rule.evaluate(&f));
        // Negation of a type mismatch is a plain boolean negation.
        assert!(RuleNode::negate(rule).evaluate(&f));
    }

    #[test]
    fn test_numeric_comparisons() {
        let f = fixture();
        let cmp = |op, v: f64| RuleNode::compare(CustomerField::OrderCount, op, v).evaluate(&f);
        assert!(cmp(ComparisonOperator::Eq, 7.0));
        assert!(cmp(ComparisonOperator::Neq, 8.0));
        assert!(cmp(ComparisonOperator::Gt, 6.0));
        assert!(cmp(ComparisonOperator::Gte, 7.0));
        assert!(cmp(ComparisonOperator::Lt, 8.0));
        assert!(cmp(ComparisonOperator::Lte, 7.0));
        assert!(!cmp(ComparisonOperator::Gt, 7.0));
    }

    #[test]
    fn test_missing_attribute_is_false_for_every_operator() {
        let f = fixture();
        for op in [
            ComparisonOperator::Eq,
            ComparisonOperator::Neq,
            ComparisonOperator::Gt,
            ComparisonOperator::Gte,
            ComparisonOperator::Lt,
            ComparisonOperator::Lte,
            ComparisonOperator::Contains,
        ] {
            let rule = RuleNode::compare(CustomerField::DaysSinceLastOrder, op, 30.0);
            assert!(!rule.evaluate(&f), "{op:?} on missing value");
        }
        let rule = RuleNode::compare(
            CustomerField::DaysSinceLastOrder,
            ComparisonOperator::In,
            vec![1.0, 2.0],
        );
        assert!(!rule.evaluate(&f));
    }

    #[test]
    fn test_type_mismatch_neq_is_false() {
        let f = fixture();
        let rule = RuleNode::compare(CustomerField::CompositeScore, ComparisonOperator::Neq, "high");
        assert!(!rule.evaluate(&f));
    }

    #[test]
    fn test_label_comparisons() {
        let f = fixture();
        let eq = RuleNode::compare(CustomerField::HealthLabel, ComparisonOperator::Eq, "loyal");
        let gte = RuleNode::compare(
            CustomerField::HealthLabel,
            ComparisonOperator::Gte,
            HealthLabel::Promising,
        );
        let within = RuleNode::compare(
            CustomerField::HealthLabel,
            ComparisonOperator::In,
            vec!["Champion", "Loyal"],
        );
        let unknown = RuleNode::compare(CustomerField::HealthLabel, ComparisonOperator::Eq, "vip");
        assert!(eq.evaluate(&f));
        assert!(gte.evaluate(&f));
        assert!(within.evaluate(&f));
        assert!(!unknown.evaluate(&f));
    }

    #[test]
    fn test_tag_contains_and_in() {
        let f = fixture();
        let has = RuleNode::compare(CustomerField::SegmentTags, ComparisonOperator::Contains, "Wholesale");
        let any_of = RuleNode::compare(
            CustomerField::SegmentTags,
            ComparisonOperator::In,
            vec!["vip", "newsletter"],
        );
        let none_of = RuleNode::compare(CustomerField::SegmentTags, ComparisonOperator::In, vec!["vip"]);
        assert!(has.evaluate(&f));
        assert!(any_of.evaluate(&f));
        assert!(!none_of.evaluate(&f));
    }

    #[test]
    fn test_nested_tree_evaluation() {
        let f = fixture();
        let rule = RuleNode::all(vec![
            RuleNode::compare(CustomerField::LifetimeSpend, ComparisonOperator::Gt, 100.0),
            RuleNode::any(vec![
                RuleNode::compare(CustomerField::OrderCount, ComparisonOperator::Gte, 10.0),
                RuleNode::negate(RuleNode::compare(
                    CustomerField::SegmentTags,
                    ComparisonOperator::Contains,
                    "vip",
                )),
            ]),
        ]);
        assert!(rule.evaluate(&f));
        assert_eq!(rule.evaluate(&f), rule.evaluate(&f));
        assert_eq!(rule.depth(), 4);
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        let scalar_in = RuleNode::compare(CustomerField::OrderCount, ComparisonOperator::In, 3.0);
        assert!(scalar_in.validate().is_err());

        let list_gt = RuleNode::compare(CustomerField::OrderCount, ComparisonOperator::Gt, vec![1.0]);
        assert!(list_gt.validate().is_err());

        let mut deep = RuleNode::compare(CustomerField::OrderCount, ComparisonOperator::Gt, 1.0);
        for _ in 0..MAX_RULE_DEPTH {
            deep = RuleNode::negate(deep);
        }
        assert!(deep.validate().is_err());
    }

    #[test]
    fn test_serialized_form() {
        let rule = RuleNode::all(vec![RuleNode::compare(
            CustomerField::OrderCount,
            ComparisonOperator::Gte,
            3.0,
        )]);
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "and",
                "children": [
                    {"type": "comparison", "field": "order_count", "op": "gte", "value": 3.0}
                ]
            })
        );
        let back: RuleNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);
    }
}
