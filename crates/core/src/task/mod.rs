//! Task module
//!
//! This module contains task-related types, the guest collection codec and
//! the remote collection seam.

mod codec;
mod model;
mod repository;
mod rest;

pub use codec::{decode_collection, encode_collection};
pub use model::*;
pub use repository::RemoteTaskCollection;
pub use rest::RestTaskCollection;
