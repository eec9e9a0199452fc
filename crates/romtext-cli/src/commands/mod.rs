//! CLI command implementations.

pub mod apply;
pub mod decode;
pub mod detect;
pub mod diff;
pub mod extract;
pub mod hex_utils;
pub mod inject;
pub mod search;
pub mod table;
pub mod validate;
