//! Object Detection Service Library

pub mod api;
pub mod cli;
pub mod config;
pub mod engine;
pub mod labels;
pub mod service;

pub use config::Config;
