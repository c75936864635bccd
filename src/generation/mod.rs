//! Generation helpers outside of a session.

pub mod text;

pub use text::{generate, GeneratedText};
