// DataFusion Evaluation Layer
//
// Residual filtering, projection and ordering over in-memory row sets is run
// by Apache Arrow DataFusion 51.0.0.

pub mod converter; // DataFusionResultConverter
pub mod evaluator; // TabularEvaluator
pub mod session; // DataFusionSessionManager

pub use converter::DataFusionResultConverter;
pub use evaluator::TabularEvaluator;
pub use session::{DataFusionSessionManager, SessionConfig};
