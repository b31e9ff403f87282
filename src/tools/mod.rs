//! Tools that sit next to remote agents.
//!
//! - [`VectorStoreTool`]: validated access to a vector database behind the
//!   [`VectorStore`] trait

mod vector_store;

pub use vector_store::{VectorAction, VectorStore, VectorStoreTool, VectorToolInput};
