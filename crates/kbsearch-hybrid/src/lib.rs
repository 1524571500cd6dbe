#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Hybrid retrieval: rank fusion and the request orchestrator that ties
//! expansion, vector search, lexical scoring, reranking and caching together.

pub mod fusion;
pub mod pipeline;

pub use fusion::{fuse, DEFAULT_RRF_K};
pub use pipeline::{RetrievalPipeline, SearchOptions};
