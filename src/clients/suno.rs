mod client;
mod models;

pub use client::{SunoClient, SunoConfig};
pub use models::{Clip, GenerateRequest};
