//! Core library for Tasky
//!
//! This crate contains the dual-mode task store and everything it leans on:
//! - Task model and the remote collection seam
//! - Expiring local storage for guest mode
//! - Mode resolution from session identity and the guest flag
//! - View projection (filter and sort)

pub mod client;
pub mod config;
pub mod error;
pub mod local;
pub mod mode;
pub mod session;
pub mod store;
pub mod task;
pub mod view;

#[cfg(test)]
mod testing;

pub use client::TaskClient;
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
