pub(crate) mod error;
pub(crate) mod redact;
pub mod retry;
pub mod text;
