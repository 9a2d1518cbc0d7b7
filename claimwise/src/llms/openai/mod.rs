//! OpenAI Chat Completions client.
//!
//! Supports text and image inputs, function tools and strict
//! `json_schema` response formats, which is everything the claim pipeline
//! asks of a model.

mod chat;
mod client;
mod config;
mod types;

pub use client::OpenAI;
pub use config::OpenAIConfig;
