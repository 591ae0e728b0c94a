// Public API for the server binary and integration tests

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod lock;
pub mod oracle;
pub mod protocol;
pub mod research;
pub mod scanner;
pub mod state;
pub mod store;
pub mod types;
