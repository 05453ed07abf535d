pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod facade;
pub mod output;
pub mod portal;
pub mod progress;
pub mod trend;

pub use facade::Retriever;
