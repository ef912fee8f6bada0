//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep callers (HTTP/UI layers) decoupled from storage details.

pub mod category_service;
pub mod contact_service;
pub mod membership_service;
