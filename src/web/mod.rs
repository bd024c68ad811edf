//! Presentation shell: the chat page and its JSON API

pub mod http;
pub mod server;

pub use server::{handle_request, serve};
