pub mod cache;
pub mod config;
pub mod display;
pub mod error;
pub mod fetch;
pub mod parser;
pub mod schedule;
pub mod web;
