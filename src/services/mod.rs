pub mod controllers; // Controller contracts
pub mod datafusion; // DataFusion residual evaluation
pub mod engine; // Query engine over the datahub
pub mod handlers; // Data and ML handler contracts, handler registry
pub mod memory; // In-memory controllers and handlers
pub mod metrics; // EVALUATE metrics
pub mod query_context; // Per-session query context stack
pub mod session; // Session state and controller wiring

pub use controllers::*;
pub use engine::{DataHubQueryEngine, ExecutionOptions, QueryEngine};
pub use handlers::{DataHandler, HandlerError, HandlerModule, HandlerRegistry, HandlerResult, MlHandler};
pub use session::{ControllerSet, SessionController};
