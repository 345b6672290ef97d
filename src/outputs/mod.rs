//! Reports built from the aggregated article store.
//!
//! # Submodules
//!
//! - [`package`]: the daily JSON package (trending terms, sentiment mix,
//!   top articles, sector briefs) for downstream consumers
//! - [`dashboard`]: a Markdown trend report over a date range
//!
//! # Output Structure
//!
//! ```text
//! output/
//! ├── ai_daily_package.json
//! └── dashboard.md
//! ```

pub mod dashboard;
pub mod package;
