//! HTTP utilities and middleware.
//!
//! This module provides the axum adapter around the requirements backend and
//! the security headers applied to every response.

pub mod pages;
pub mod requirements;
pub mod security;

pub use requirements::{requirements_middleware, PageRequirements, RequirementsContext};
pub use security::{apply_content_security_policy, apply_security_headers};
