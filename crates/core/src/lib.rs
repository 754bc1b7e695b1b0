pub mod catalog;
pub mod category;
pub mod fields;
pub mod record;

pub use catalog::{Catalog, CatalogError, DocumentTypeDefinition};
pub use category::Category;
pub use fields::{ClassificationResult, ExtractedFields};
pub use record::StructuredRecord;
