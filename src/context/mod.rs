//! Context assembly for agent tasks

pub mod assembler;
pub mod models;

pub use assembler::ContextAssembler;
pub use models::{RelationshipNeighborhood, TaskContext, TaskSummary};
