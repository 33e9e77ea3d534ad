//! Newsroom: in-process content cache for a CMS-backed news site.
//!
//! [`cache`] holds the cache itself; [`infra`] wires it to the upstream CMS,
//! telemetry and the administrative HTTP surface; [`config`] resolves
//! deployment settings.

pub mod cache;
pub mod config;
pub mod infra;
