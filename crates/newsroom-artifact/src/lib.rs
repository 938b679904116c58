//! Newsroom Artifact System
//!
//! Content-addressed building blocks shared by the snapshot pipeline.
//!
//! # Core Concepts
//!
//! - [`ContentHash`]: 32-byte SHA-256 hash, the integrity anchor of a snapshot
//! - [`canonical`]: key-sorted, whitespace-free JSON used as hash input
//! - [`Artifact<T>`]: content-addressed container for typed content
//! - [`JsonLdGraph`]: the metadata graph of an Immutable Canonical File
//! - [`DocPath`]: hierarchical addressing in the document store
//!
//! # Example
//!
//! ```rust,ignore
//! use newsroom_artifact::{Artifact, JsonLdArtifact, JsonLdGraph};
//!
//! let artifact = Artifact::<JsonLdArtifact>::new(graph)?;
//! println!("Hash: {}", artifact.hash());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
pub mod canonical;
mod hash;
pub mod jsonld;
mod path;

pub use artifact::{Artifact, ArtifactError, ArtifactType};
pub use hash::{normalize_hash_hex, ContentHash, HashError, HASH_HEX_LEN};
pub use jsonld::{
    JsonLdArtifact, JsonLdGraph, JsonLdNode, KARMA_QUERY_NODE_ID, SNAPSHOT_NODE_ID, VOLATILE_KEYS,
};
pub use path::{DocPath, PathError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
