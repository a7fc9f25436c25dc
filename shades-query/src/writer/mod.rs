//! Shading language writers.

pub mod glsl;
