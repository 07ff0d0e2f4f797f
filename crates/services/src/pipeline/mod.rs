pub mod orchestrator;
pub mod persistence;
pub mod quota;
pub mod resolver;
pub mod scheduling;
pub mod work_item;

pub use orchestrator::{BatchError, KeyLocks, Orchestrator};
pub use persistence::{PersistenceCoordinator, PersistenceError};
pub use quota::{Classification, QuotaHeuristic};
pub use resolver::{BatchRequestResolver, parse_artifact_path};
pub use scheduling::{BlackoutWindow, SchedulingPolicy};
pub use work_item::{BatchRequest, BatchResult, BatchShape, DedupeKey, WorkItem, WorkItemRef};
