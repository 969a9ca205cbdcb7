//! digest-press domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `usecases`: Rewrite engine, newsletter assembler and pipeline orchestrator
//! - `policy`: Acceptance rules for model output
//! - `template`: The operator-editable instruction template

pub mod model;
pub mod policy;
pub mod ports;
pub mod template;
pub mod usecases;

pub use model::*;
pub use ports::*;
pub use template::{InstructionTemplate, TemplateError, TemplateFields};
