pub mod config;
pub mod crypto;
pub mod engine;
pub mod errors;
pub mod model;
pub mod providers;
pub mod scoring;
pub mod storage;
pub mod validate;
