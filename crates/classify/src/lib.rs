pub mod classifier;
pub mod extract;

pub use classifier::Classifier;
pub use extract::{extract_fields, FieldKind};
