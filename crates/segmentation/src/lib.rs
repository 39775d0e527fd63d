//! Rule-based customer segmentation: a closed rule grammar, a total
//! evaluator, versioned segment definitions, and a fluent segment builder.

pub mod builder;
pub mod engine;
pub mod rules;
pub mod schema;

pub use builder::SegmentBuilder;
pub use engine::{CustomerSnapshot, SegmentRegistry};
pub use rules::{ComparisonOperator, CustomerField, RuleNode, RuleValue};
pub use schema::{SchemaError, SegmentDefinition, SEGMENT_SCHEMA_VERSION};
