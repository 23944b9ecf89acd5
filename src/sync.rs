//! Synchronization primitives used across the crate.
//!
//! Import from this module instead of directly from `parking_lot` or `std::sync`:
//!
//! ```ignore
//! use crate::sync::{Arc, Mutex};
//! ```

pub(crate) use parking_lot::Mutex;
pub(crate) use std::sync::Arc;
