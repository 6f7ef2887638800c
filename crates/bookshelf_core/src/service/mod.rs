//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own unit-of-work demarcation for operations that resolve associations.
//! - Keep callers (CLI, HTTP controllers) decoupled from storage details.

pub mod book_service;
