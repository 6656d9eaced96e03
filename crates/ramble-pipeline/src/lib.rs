pub mod context;
pub mod error;
pub mod normalize;
pub mod pipeline;

pub use error::{PipelineError, Result};
pub use normalize::{normalize, NormalizedClaim, NormalizedCorrection, NormalizedEntity, NormalizedExtraction, NormalizedGoal};
pub use pipeline::{ExtractFromUnitHandler, ExtractionPipeline, PipelineOutput, PipelineStep};
