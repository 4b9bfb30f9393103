//! Backends for shader generation.

pub mod spv;
