//! Core domain model and schema for marginalia.
//!
//! This crate defines the notes data model (User, Note, Flag, ListItem),
//! the SQLite schema, and the versioned migration runner that brings a
//! database file up to the current released schema before the application
//! starts serving.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod schema;

pub use error::{Error, Result};
