//! Service layer sitting between HTTP handlers and object backends.

pub mod content_service;

pub use content_service::ContentStore;
