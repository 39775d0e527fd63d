//! Segment builder: fluent API for constructing segment rules.

use intel_core::types::HealthLabel;

use crate::rules::{ComparisonOperator, CustomerField, RuleNode, RuleValue};
use crate::schema::{SchemaError, SegmentDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    All,
    Any,
}

pub struct SegmentBuilder {
    name: String,
    description: Option<String>,
    conditions: Vec<RuleNode>,
    combinator: Combinator,
}

impl SegmentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            conditions: Vec::new(),
            combinator: Combinator::All,
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Match when any condition holds instead of all of them.
    pub fn with_or(mut self) -> Self {
        self.combinator = Combinator::Any;
        self
    }

    pub fn condition(
        mut self,
        field: CustomerField,
        op: ComparisonOperator,
        value: impl Into<RuleValue>,
    ) -> Self {
        self.conditions.push(RuleNode::compare(field, op, value));
        self
    }

    pub fn label_is(self, label: HealthLabel) -> Self {
        self.condition(CustomerField::HealthLabel, ComparisonOperator::Eq, label)
    }

    pub fn label_in(self, labels: Vec<HealthLabel>) -> Self {
        self.condition(CustomerField::HealthLabel, ComparisonOperator::In, labels)
    }

    pub fn spend_at_least(self, amount: f64) -> Self {
        self.condition(CustomerField::LifetimeSpend, ComparisonOperator::Gte, amount)
    }

    pub fn orders_at_least(self, count: u32) -> Self {
        self.condition(CustomerField::OrderCount, ComparisonOperator::Gte, count)
    }

    pub fn inactive_for_days(self, days: u32) -> Self {
        self.condition(CustomerField::DaysSinceLastOrder, ComparisonOperator::Gt, days)
    }

    pub fn tagged(self, tag: impl Into<String>) -> Self {
        self.condition(CustomerField::SegmentTags, ComparisonOperator::Contains, tag.into())
    }

    /// Add an arbitrary sub-rule.
    pub fn rule(mut self, rule: RuleNode) -> Self {
        self.conditions.push(rule);
        self
    }

    /// Add a sub-rule that must *not* match.
    pub fn exclude(mut self, rule: RuleNode) -> Self {
        self.conditions.push(RuleNode::negate(rule));
        self
    }

    /// The combined rule tree. A single condition is returned unwrapped.
    pub fn to_rule(&self) -> RuleNode {
        if self.conditions.len() == 1 {
            return self.conditions[0].clone();
        }
        match self.combinator {
            Combinator::All => RuleNode::all(self.conditions.clone()),
            Combinator::Any => RuleNode::any(self.conditions.clone()),
        }
    }

    pub fn build(self) -> Result<SegmentDefinition, SchemaError> {
        let rule = self.to_rule();
        SegmentDefinition::new(self.name, self.description, rule)
    }
}
