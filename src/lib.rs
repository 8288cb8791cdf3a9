pub mod core;
pub mod embedding;
pub mod qa;
pub mod state;
pub mod store;
pub mod vector_math;
