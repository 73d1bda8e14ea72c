#![deny(missing_docs, clippy::missing_safety_doc, unsafe_op_in_unsafe_fn)]

//! Adaptive radix tree mapping fixed-width `u64` keys to opaque byte values.
//!
//! # References
//!
//!  - Leis, V., Kemper, A., & Neumann, T. (2013, April). The adaptive radix
//!    tree: ARTful indexing for main-memory databases. In 2013 IEEE 29th
//!    International Conference on Data Engineering (ICDE) (pp. 38-49). IEEE.
//!    [Link to PDF][ART paper]
//!
//! [ART paper]: https://www-db.in.tum.de/~leis/papers/ART.pdf

mod alloc;
mod error;
mod key;
mod nodes;
mod stats;
mod tagged_pointer;
mod tree;

pub use error::{InsertError, MAX_VALUE_LEN};
pub use nodes::NodeType;
pub use tree::{Tree, TreeConfig};
