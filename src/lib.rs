//! In-memory IPv4/IPv6 routing table: a full binary prefix tree and a
//! PATRICIA radix trie sharing one generic contract over address families.
//!
//! [`IPPrefixTree`] is the uncompressed binary tree bound to IPv4;
//! [`IPRadixTree`] is the path-compressed PATRICIA trie bound to IPv6 (§6).
//! Both are built on [`BinaryTree`]/[`PatriciaTree`], which stay generic over
//! [`Family`] so the bit-level algorithms are written once.
#![warn(missing_docs)]

pub mod binary_tree;
pub mod error;
pub mod family;
mod order;
pub mod patricia;
pub mod route;

pub use binary_tree::BinaryTree;
pub use error::Error;
pub use family::{Family, Ipv4, Ipv6};
pub use patricia::PatriciaTree;
pub use route::{AttrMap, AttrValue, Route};

/// Full binary prefix tree bound to IPv4 (§6).
pub type IPPrefixTree = BinaryTree<Ipv4>;

/// PATRICIA radix trie bound to IPv6 (§6).
pub type IPRadixTree = PatriciaTree<Ipv6>;
