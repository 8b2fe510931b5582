// src/lib.rs

//! Section Tracker Library
//!
//! Polls tracked course sections, detects seat and instructor changes and
//! notifies subscribers across their enabled channels.

pub mod config;
pub mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
