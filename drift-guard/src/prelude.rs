//! Prelude for commonly used types and traits in drift-guard.

pub use crate::error::{DriftError, Result};
pub use crate::exit::{exit_code, EXIT_DRIFT, EXIT_FATAL, EXIT_PASS};
pub use crate::logging::LogConfig;
pub use crate::report::{CheckStatus, Report};
pub use crate::schema::{FieldRule, FieldType, SchemaDefinition};
pub use crate::sources::{SourceAdapter, SourceCapabilities};
pub use crate::validator::{Validator, ValidatorBuilder};
