//! Customer intelligence: grounded context assembly, threshold alerts and
//! the rate-limited, degrading orchestration of completion calls.

pub mod alerts;
pub mod context;
pub mod orchestrator;
pub mod prompts;

pub use alerts::threshold_alerts;
pub use context::{ContextBuilder, ContextBundle, PopulationScan, RenderedContext, RequestKind, Subject};
pub use orchestrator::{
    AlertOutcome, IntelligenceEngine, IntelligenceRequest, IntelligenceResponse, IntelligenceResult,
    ValidatedRequest,
};
