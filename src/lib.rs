//! Popularity-Filtered Product Feed Collector
//!
//! This library provides the core functionality for the trend-harvest system:
//! an asynchronous job orchestrator that collects popular product listings from
//! the Ably category feed, deduplicates them against a durable ledger of
//! everything collected in prior runs, and records the survivors for
//! downstream image classification.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
