#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::print_stdout,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]

pub mod assets;
pub mod config;
pub mod error;
pub mod html;
pub mod http;
pub mod inject;
pub mod nonce;
pub mod registry;
pub mod theme;

pub use error::RequirementsError;
