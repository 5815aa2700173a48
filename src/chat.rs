/// Study backend client module.
///
/// This module provides a synchronous HTTP client for the chat Q&A and quiz
/// endpoints of the study backend.
mod client;

pub use client::{ChatBackend, ChatClient, ChatClientBuilder, ChatError};
