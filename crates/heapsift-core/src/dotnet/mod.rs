//! Managed-runtime object recognition

mod classifier;
mod header;
mod string;

pub use classifier::{BIG_INTEGER_TYPE_PATTERNS, RuntimeClassifier};
pub use header::{MethodTable, ObjectHeader};
pub use string::read_managed_string;
