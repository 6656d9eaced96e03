pub mod error;
pub mod phonetic;
pub mod service;

pub use error::{CorrectionError, Result};
pub use phonetic::{PhoneticHint, PhoneticMatcher};
pub use service::{CorrectionService, ProcessTextResult};
