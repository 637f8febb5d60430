//! Rental listing harvester.
//!
//! Three passes over a marketplace, each usable on its own:
//!
//! 1. listings: open a search page, collect item URLs, extract each item
//! 2. hosts: visit every host profile referenced by the listings
//! 3. merge: join both datasets on the host profile URL
//!
//! Pages are only reached through [`renderer::Renderer`], so everything but
//! [`browser`] runs against static HTML in tests.

pub mod browser;
pub mod collector;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extractor;
pub mod fallback;
pub mod host_section;
pub mod models;
pub mod patterns;
pub mod pipeline;
pub mod profile;
pub mod proxy;
pub mod reconcile;
pub mod renderer;
pub mod stealth;
pub mod store;
pub mod urls;

#[cfg(test)]
mod testing;
