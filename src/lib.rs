pub mod cache;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod extract;
pub mod merge;
pub mod progress;
pub mod remote;
pub mod walk;
pub mod workflow;

// Re-export commonly used types
pub use cache::ChangeCache;
pub use catalog::{Catalog, CatalogEntry};
pub use codec::{DocumentCodec, Edit, Node, ScalarNode, YamlCodec};
pub use config::AppConfig;
pub use error::{LocError, Result};
pub use extract::{ExtractStats, Extractor};
pub use merge::{MergeStats, Merger};
pub use progress::{CancelFlag, Completion, NoProgress, Progress};
pub use remote::{ParatranzClient, RemoteSync};
pub use walk::DocumentWalker;
pub use workflow::{run_workflow, Runner, WorkflowOutcome};
