//! WhyBot — deliberately unhelpful chat replies, styled by an external LLM.
//!
//! The [`pipeline::ResponsePipeline`] turns one user message into one
//! [`pipeline::ChatResponse`]: pick a style, compose a system instruction,
//! call the model, normalize the outcome.

pub mod config;
pub mod console;
pub mod error;
pub mod llm;
pub mod logger;
pub mod pipeline;
