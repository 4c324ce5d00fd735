//! Concrete provider backends.

mod openai;

pub use openai::{OpenAiProvider, OpenAiProviderBuilder};
