pub mod pipeline;
pub mod providers;
pub mod state;

pub use pipeline::{DocumentPipeline, PipelineError, ProcessedDocument};
pub use providers::{
    HttpStructurer, MockOcr, MockStructurer, OcrError, OcrProvider, StructuringError,
    StructuringProvider,
};
pub use state::ProcessingState;
