//! Gem catalog admin library.
//!
//! This crate provides the console functionality as a library, allowing it
//! to be tested and reused by the CLI.
//!
//! # Layout
//!
//! - [`store`] - Document store contract and the in-process store
//! - [`storage`] - Object storage for product images
//! - [`mirror`] - Live in-memory mirrors of store queries
//! - [`services`] - Catalog sync, category tree, product forms, CMS, dashboard
//! - [`notices`] - User-visible notices
//! - [`console`] - Per-session services and their registry
//! - [`middleware`] - Cookie sessions
//! - [`routes`] - JSON HTTP API

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod console;
pub mod display;
pub mod error;
pub mod middleware;
pub mod mirror;
pub mod models;
pub mod notices;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod store;
