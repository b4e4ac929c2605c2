//! Storage layer: on-disk layout, caches, segmented I/O and the writer
//!
//! - [`varint`] - variable-length integer codec
//! - [`cache`] - winner/loser adaptive cache
//! - [`stream`] - multi-segment file stream
//! - [`header`], [`mimetypes`], [`dirent`], [`cluster`], [`compression`] -
//!   binary layout decoders and encoders
//! - [`archive`] - validated archive handle with entry and cluster caches
//! - [`writer`] - archive creation from an article source

pub mod archive;
pub(crate) mod bytes;
pub mod cache;
pub mod cluster;
pub mod compression;
pub mod config;
pub mod dirent;
pub mod error;
pub mod header;
pub mod mimetypes;
pub mod stream;
pub mod varint;
pub mod writer;

pub use archive::Archive;
