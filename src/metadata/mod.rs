//! Attribute resolution facade
//!
//! Query interface over resolved test descriptors and a typed builder for
//! declaring test classes in Rust.

mod builder;
mod resolver;

pub use builder::{LevelBuilder, TestClassBuilder, TestMethodBuilder};
pub use resolver::{AttributeResolver, DeclaredAttributes};
