//! Structural, type and business-rule validation of raw datasets, plus cleaning
//!
//! Validators never mutate their input. Structure and type failures are
//! fatal (`ValidationReport::ok == false`); business-rule findings are
//! warnings and leave `ok` set.

mod clean;
mod validate;

pub use clean::clean;
pub use validate::{
    load_and_validate, percentile, validate_business_rules, validate_structure, validate_types,
    Validated, ValidationReport,
};
