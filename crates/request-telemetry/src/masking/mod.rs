//! Sensitive-field masking rules.
//!
//! - **builtins**: fixed maskers for `password`, `email`, `mobileNo`, `phone`
//! - **registry**: the per-request field-name → replacement table

mod builtins;
mod registry;

pub use builtins::{
    BUILTIN_RULES, BuiltinMasker, mask_email, mask_number, mask_number_with, mask_password,
};
pub use registry::{MaskAction, MaskRegistry, MaskRule};
