//! Model provider implementations.
//!
//! - [`openai`]: the OpenAI Chat Completions API
//! - [`mock`]: a scripted provider for tests and dry runs

pub mod mock;
pub mod openai;

pub use mock::MockProvider;
pub use openai::{OpenAI, OpenAIConfig};
