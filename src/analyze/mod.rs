pub mod context;
pub mod static_analysis;
pub mod verify;

pub use context::{classify, Classifier, ContextLabel, ContextSummary, LineClassifier};
pub use static_analysis::{static_analysis, PathReflection, Policy};
