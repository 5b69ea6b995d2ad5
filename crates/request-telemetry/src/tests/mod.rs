//! Test module for request-telemetry
//!
//! Grouped suites exercising the public API across modules, including
//! property-based tests using proptest.


#[cfg(test)]
pub mod recorder_tests;
