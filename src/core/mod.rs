//! Core functionality module
//!
//! This module contains the core business logic of the album sync,
//! including configuration management, error handling, the sync engine,
//! and run tracking.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and management
//! - `error` - Error types and result aliases
//! - `sync` - Album mirroring and run orchestration
//! - `tracking` - Sync history and session tracking

pub mod config;
pub mod error;
pub mod sync;
pub mod tracking;
