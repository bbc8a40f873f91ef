//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level APIs.
//! - Keep UI/CLI layers decoupled from storage details.

pub mod author_service;
