//! The library code for the `quire` static blog generator. A build can be
//! broken down into these steps:
//!
//! 1. Finding post directories under the posts directory
//!    ([`crate::discover`])
//! 2. Building each post on a pool of worker threads ([`crate::post`]):
//!    reading its metadata ([`crate::metadata`]), rendering its markdown
//!    ([`crate::markdown`]), claiming its output directory
//!    ([`crate::registry`]), and writing its page ([`crate::template`])
//! 3. Stitching the site together once every post is done
//!    ([`crate::build`]): copying static files, pruning output of posts that
//!    no longer exist, and writing the index page and the RSS feed
//!    ([`crate::feed`])
//!
//! A post that fails to build is logged and left out of the site; it never
//! stops the others. Everything is configured through
//! [`crate::config::Config`].

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod discover;
pub mod feed;
pub mod markdown;
pub mod metadata;
pub mod post;
pub mod registry;
pub mod template;
pub mod util;

#[cfg(test)]
mod test_helpers;
