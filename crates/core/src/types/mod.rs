//! Core types for the gem catalog.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod images;
pub mod name;
pub mod price;

pub use id::*;
pub use images::{ImageList, ImageListError, MAX_PRODUCT_IMAGES};
pub use name::{NameError, RequiredName};
pub use price::{Price, PriceError};
