//! Normalization and data-quality stages.

pub mod normalize;
pub mod quality;
pub mod schema;

pub use normalize::{normalize, CoercionReport};
pub use quality::{run_quality_gate, GateReport};
pub use schema::SemanticType;
