pub mod builder;
pub mod error;
mod index;
pub mod persist;
pub mod postings;
pub mod query;
pub mod scoring;
pub mod search;
pub mod snippet;
pub mod source;
pub mod tokenizer;

pub use error::{IndexError, Result};
pub use index::*;
