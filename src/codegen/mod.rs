//! Self-correcting generation of extraction routines.
//!
//! - [`repair`]: decode `{explanation, code}` from free-form model output
//! - [`validate`]: structural check of routine output
//! - [`reflection`]: the generate/execute/validate loop that feeds failures
//!   back to the model

pub mod reflection;
pub mod repair;
pub mod validate;

pub use reflection::{
    GenerationAttempt, GenerationOutcome, ParserGenerator, PromptVariant, MAX_ITERATIONS,
};
pub use repair::{repair_response, RepairStrategy, RepairedResponse};
pub use validate::{is_truthy, validate_products};
