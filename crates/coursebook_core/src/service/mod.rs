//! Use-case services over the record store.
//!
//! # Responsibility
//! - Compose validation, deletion planning and storage into transactional
//!   entry points.
//! - Keep callers decoupled from SQL and transaction handling.

pub mod record_service;
