//! Core of the design-system console: tokens, surface policy, QA reports,
//! registry metadata and local storage.

pub mod config;
pub mod dom;
pub mod error;
pub mod kv;
pub mod models;
pub mod qa;
pub mod registry;
pub mod storage;
pub mod surface;
pub mod tokens;
