//! Intake pipeline: validation → extraction → quality gate → transform,
//! driven per file by the batch runner.

pub mod error;
pub mod validation;
pub mod extraction;
pub mod quality;
pub mod transform;
pub mod batch;

#[cfg(test)]
pub(crate) mod test_support;
