//! Paperbundle Core Library
//!
//! This library turns rendered scholarly articles into self-contained local
//! bundles and enhances those bundles for display. The build half fetches an
//! article's rendered page from a pair of mirrors, isolates the article
//! markup, localizes its figures, and persists a bundle next to the page
//! that embeds it. The reader half loads a bundle, indexes its
//! bibliography, rewrites numeric citations to author-year prose, and
//! builds the navigation a long article needs.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fetch`] - HTTP fetching with fixed-delay retries and manual redirects
//! - [`mirror`] - Mirror fallback and per-mirror asset conventions
//! - [`extract`] - Article isolation and chrome stripping
//! - [`assets`] - Figure discovery, download, and reference rewriting
//! - [`normalize`] - Ordered text cleanup passes over article markup
//! - [`bundle`] - Bundle serialization and persistence
//! - [`config`] - Article manifest loading
//! - [`build`] - Batch orchestration over manifest records
//! - [`reader`] - Display-time enhancement and per-view session state

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assets;
pub mod build;
pub mod bundle;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod mirror;
pub mod normalize;
pub mod reader;

// Re-export commonly used types
pub use build::{BatchBuilder, BuildError, BuildOptions, BuildStats, DEFAULT_CONCURRENCY};
pub use bundle::{ArticleBundle, BundleError, BUNDLE_FILENAME};
pub use config::{ArticleRecord, ConfigError, Manifest, DEFAULT_MANIFEST_PATH};
pub use fetch::{FetchClient, FetchError, FetchPolicy, DEFAULT_RETRIES};
pub use mirror::{MirrorError, MirrorKind, MirrorResolver, RawDocument};
pub use reader::{ReaderError, ReaderSession, ReaderView};
