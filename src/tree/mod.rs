//! Filesystem tree hashing
//!
//! Path normalization, file and directory digests, and the walker that seeds the
//! checksum store from a root directory.

pub mod hasher;
pub mod path;
pub mod walker;
