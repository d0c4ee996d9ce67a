//! The library code for the `basalt` static site generator. The architecture
//! can be generally broken down into two distinct steps:
//!
//! 1. Parsing posts and pages from source files on disk ([`crate::parser`])
//! 2. Converting them into output files on disk ([`crate::write`])
//!
//! Of the two, the second step is the more involved. It is itself composed of
//! three distinct sub-steps:
//!
//! 1. Building post and standalone pages
//! 2. Building index pages
//! 3. Rendering all pages to disk
//!
//! Again here the second sub-step is the more involved, because we need to
//! create groups of index pages for each tag and another group for the empty tag
//! which corresponds to all posts. A group of index pages is referred to as an
//! "index", and each index is paginated--converted into groups of pages based on
//! a configurable number of posts per index page.
//!
//! [`crate::build`] ties the steps together and adds the feed, the syntax
//! stylesheet and the static assets. [`crate::serve`] wraps a build in a
//! local server that rebuilds on changes, and [`crate::new`] scaffolds posts.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod feed;
pub mod highlight;
mod htmlrenderer;
pub mod markdown;
pub mod new;
pub mod parser;
pub mod post;
pub mod serve;
pub mod tag;
pub mod url;
mod util;
pub mod watch;
pub mod write;
