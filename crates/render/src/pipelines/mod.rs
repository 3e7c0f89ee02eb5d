//! Render pipelines.

pub mod pbr;
