pub mod codec;
pub mod core_api;
pub mod document;
pub mod error;
pub mod fingerprint;
pub mod history;
pub mod projector;
