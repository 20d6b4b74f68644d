// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions
)]

//! # Markmaid
//!
//! A markdown transform that renders `mermaid` code blocks to inline HTML
//! diagrams.
//!
//! Markmaid walks a [comrak](https://docs.rs/comrak) document tree, renders
//! every fenced code block tagged `mermaid` through the real mermaid engine
//! running in a headless-browser sandbox, and splices the resulting markup
//! back into the tree — one `<div class="mermaid mermaid__light">` per
//! diagram, plus a `mermaid__dark` sibling when dual-theme rendering is on
//! (the default).
//!
//! ```no_run
//! use comrak::{Arena, parse_document};
//! use markmaid::{Options, transform};
//!
//! # async fn example() -> Result<(), markmaid::TransformError> {
//! let arena = Arena::new();
//! let root = parse_document(&arena, "```mermaid\ngraph TD; A-->B;\n```", &comrak::Options::default());
//! transform(root, &arena, &Options::default()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! The transform future borrows the arena tree and is not `Send`; drive it
//! with a current-thread runtime or `block_on`.
//!
//! ## Modules
//!
//! - [`options`]: the user-facing configuration surface
//! - [`translate`]: options → renderer-native configuration
//! - [`collect`]: the tree-collection pass
//! - [`session`]: the headless-browser render session
//! - [`transform`](crate::transform()): the orchestrator

pub mod collect;
pub mod error;
pub mod id;
pub mod options;
pub mod session;
pub mod transform;
pub mod translate;

pub use error::TransformError;
pub use options::{Options, RenderMode};
pub use session::{BrowserSession, RenderSession};
pub use transform::{transform, transform_with_session};
