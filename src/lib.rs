pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod congress;
pub mod data;
pub mod ingest;
pub mod logging;
pub mod pacer;
pub mod state;
pub mod summarizer;
pub mod utils;
pub mod web;
