//! tutor-text
//!
//! Lexical retrieval: a case-folding word tokenizer, an in-memory BM25
//! (Okapi) model built on the `bm25` crate and aligned with the chunk
//! metadata array, and the `LexicalSearcher` that ranks chunks against a
//! query.

pub mod okapi;
pub mod search;
pub mod tokenize;

pub use okapi::{Bm25Model, Bm25Params, WordTokenizer};
pub use search::{LexicalSearcher, LexicalSnapshot};
pub use tokenize::tokenize;
