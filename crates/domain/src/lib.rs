//! `osb-domain`: types shared by every osb crate, namely the error taxonomy,
//! configuration, and structured trace events.

pub mod config;
pub mod error;
pub mod trace;
