//! tutor-vector
//!
//! Dense retrieval over a pre-built embedding index: an exact inner-product
//! index (`FlatIpIndex`), the `VectorSearcher` that embeds queries and maps
//! row ids back to chunks, and loading of on-disk index snapshots.

pub mod index;
pub mod search;
pub mod store;

pub use index::FlatIpIndex;
pub use search::{VectorSearcher, VectorSnapshot};
pub use store::{IndexManifest, StoredIndex, MANIFEST_FILE};
