//! Debug utilities for inspecting ROM images
//!
//! This module provides tools for:
//! - Hex and decoded views of a byte range (`DecodeView`)
//! - Locating encoded text in an image (`TextMatch`)

mod dump;
mod scan;

pub use dump::{DecodeView, DecodedToken, hexdump};
pub use scan::{TextMatch, find_bytes, find_text};
