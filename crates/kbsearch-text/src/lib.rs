#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! kbsearch-text
//!
//! Query-side text processing: domain terminology expansion and the lexical
//! scoring channel used alongside vector search.

pub mod lexical;
pub mod terminology;

pub use lexical::{annotate, rank, score};
pub use terminology::TerminologyExpander;
