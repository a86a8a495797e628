//! Backend providers
//!
//! Narrow capability interfaces over the external collaborators —
//! embedding, chat and vector storage — plus the shared retry policy
//! their transport paths use.

pub mod chat;
pub mod embedding;
pub mod retry;
pub mod vector_store;
