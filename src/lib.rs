// src/lib.rs

pub mod backend;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod session;
pub mod state;
pub mod utils;

// Router entry point for the binary and integration tests
pub use routes::create_router;
