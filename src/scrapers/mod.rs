//! Article discovery and body extraction.
//!
//! Collection follows a two-phase pattern:
//!
//! 1. **Searching**: [`naver`] pages through the news search API per keyword
//!    and returns [`crate::models::CollectedArticle`]s without bodies.
//! 2. **Fetching**: [`content`] downloads each publisher page and runs the
//!    extraction cascade, using [`sites`] for publishers with their own markup.
//!
//! Failed pages are logged and recorded on the article, never fatal.

pub mod content;
pub mod naver;
pub mod sites;
