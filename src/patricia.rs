//! PATRICIA radix trie: path-compressed edges, one node per stored or
//! branching prefix rather than one per bit.
//!
//! Grounded on the split/merge mechanics of the teacher crate's
//! `map/mod.rs` (`new_inner_unknown_order`, `insert_uncompressed`'s
//! divergence handling) but restructured around `[Option<Box<Node>>; 2]`
//! child slots in the style of `tree/mod.rs`'s `Node`, rather than the
//! teacher's two-variant `Leaf`/`InnerNode` enum: a route list can live on
//! *any* node along a path here (not only leaves), since distinct `Route`s
//! are never merged by value the way the teacher's `RadixMap` merges
//! equal-valued leaves (§4.3).

use std::marker::PhantomData;

use log::{debug, trace};

use crate::error::Error;
use crate::family::{format_masked, Family, UintBits};
use crate::order::{sort_ascending, sort_descending_length};
use crate::route::{matches_filter, remove_matching, AttrMap, Route};

/// One compressed edge's destination: the cumulative bits and length from
/// the tree root, plus whatever routes are attached exactly here.
#[derive(Debug)]
struct Node {
	bits: u128,
	len: u32,
	routes: Vec<Route>,
	children: [Option<Box<Node>>; 2],
}

impl Node {
	fn new_leaf(bits: u128, len: u32, route: Route) -> Self {
		Node {
			bits,
			len,
			routes: vec![route],
			children: [None, None],
		}
	}

	fn new_branch(bits: u128, len: u32) -> Self {
		Node {
			bits,
			len,
			routes: Vec::new(),
			children: [None, None],
		}
	}

	fn child_count(&self) -> usize {
		self.children.iter().filter(|c| c.is_some()).count()
	}

	fn collect_all(&self, filter: &AttrMap, out: &mut Vec<Route>) {
		out.extend(self.routes.iter().filter(|r| matches_filter(r, filter)).cloned());
		for child in self.children.iter().flatten() {
			child.collect_all(filter, out);
		}
	}

	fn collect_descendants(&self, filter: &AttrMap, out: &mut Vec<Route>) {
		for child in self.children.iter().flatten() {
			child.collect_all(filter, out);
		}
	}

	fn collect_match(&self, bits: u128, query_len: u32, filter: &AttrMap, out: &mut Vec<Route>) {
		out.extend(self.routes.iter().filter(|r| matches_filter(r, filter)).cloned());
		if self.len >= query_len {
			return;
		}
		let side = bit_side(bits, self.len);
		if let Some(child) = &self.children[side] {
			if child.len <= query_len && child.bits.common_prefix_len(bits, child.len) == child.len {
				child.collect_match(bits, query_len, filter, out);
			}
		}
	}

	fn collect_wildcard(&self, addr: u128, wildcard: u128, max_depth: u32, filter: &AttrMap, out: &mut Vec<Route>) {
		out.extend(self.routes.iter().filter(|r| matches_filter(r, filter)).cloned());
		if self.len >= max_depth {
			return;
		}
		for child in self.children.iter().flatten() {
			let to = child.len.min(max_depth);
			if !range_conflict(child.bits, addr, wildcard, self.len, to) {
				child.collect_wildcard(addr, wildcard, max_depth, filter, out);
			}
		}
	}
}

/// Insert `route` at the node reachable through `slot`, splitting or
/// extending the compressed path as needed (§4.3 "Insert").
fn insert_at(slot: &mut Option<Box<Node>>, bits: u128, target_len: u32, route: Route) {
	match slot {
		None => {
			*slot = Some(Box::new(Node::new_leaf(bits, target_len, route)));
		},
		Some(node) => {
			let shared = node.bits.common_prefix_len(bits, node.len.min(target_len));
			if shared < node.len {
				// Bits diverge before this node's own label ends: split the
				// edge above it into a new branch node.
				let old = slot.take().unwrap();
				let mut branch = Node::new_branch(old.bits.mask_to_len(shared), shared);
				let old_side = bit_side(old.bits, shared);
				if shared == target_len {
					branch.routes.push(route);
					branch.children[old_side] = Some(old);
				} else {
					let new_side = 1 - old_side;
					branch.children[old_side] = Some(old);
					branch.children[new_side] = Some(Box::new(Node::new_leaf(bits, target_len, route)));
				}
				*slot = Some(Box::new(branch));
			} else if node.len == target_len {
				node.routes.push(route);
			} else {
				let side = bit_side(bits, node.len);
				insert_at(&mut node.children[side], bits, target_len, route);
			}
		},
	}
}

fn find_exact(mut node: &Node, bits: u128, target_len: u32) -> Option<&Node> {
	loop {
		let shared = node.bits.common_prefix_len(bits, node.len.min(target_len));
		if shared < node.len {
			return None;
		}
		if node.len == target_len {
			return Some(node);
		}
		let side = bit_side(bits, node.len);
		node = node.children[side].as_deref()?;
	}
}

/// Collapse `slot`'s node into its single remaining child, or drop it
/// entirely, if it now carries no routes (§4.3 "collapse on delete").
fn collapse_if_redundant(slot: &mut Option<Box<Node>>) {
	let Some(node) = slot else {
		return;
	};
	if !node.routes.is_empty() {
		return;
	}
	match node.child_count() {
		0 => *slot = None,
		1 => {
			let only = node.children.iter_mut().find_map(|c| c.take()).unwrap();
			*slot = Some(only);
		},
		_ => {},
	}
}

fn delete_at(slot: &mut Option<Box<Node>>, bits: u128, target_len: u32, filter: &AttrMap, out: &mut Vec<Route>) {
	let Some(node) = slot else {
		return;
	};
	let shared = node.bits.common_prefix_len(bits, node.len.min(target_len));
	if shared < node.len {
		return;
	}
	if node.len == target_len {
		remove_matching(&mut node.routes, filter, out);
	} else {
		let side = bit_side(bits, node.len);
		delete_at(&mut node.children[side], bits, target_len, filter, out);
	}
	collapse_if_redundant(slot);
}

/// Filtered removal over the whole subtree reachable through `slot`.
fn flush_subtree(slot: &mut Option<Box<Node>>, filter: &AttrMap, out: &mut Vec<Route>) {
	let Some(node) = slot else {
		return;
	};
	remove_matching(&mut node.routes, filter, out);
	for side in 0..2 {
		flush_subtree(&mut node.children[side], filter, out);
	}
	collapse_if_redundant(slot);
}

/// Flush every route in the subtree at or below `prefix_len` bits of
/// `bits`, even when no node sits at exactly that length because the edge
/// leading to it was path-compressed through.
fn flush_at(slot: &mut Option<Box<Node>>, bits: u128, prefix_len: u32, filter: &AttrMap, out: &mut Vec<Route>) {
	let Some(node) = slot else {
		return;
	};
	let cap = node.len.min(prefix_len);
	if node.bits.common_prefix_len(bits, cap) < cap {
		return;
	}
	if node.len >= prefix_len {
		flush_subtree(slot, filter, out);
		return;
	}
	let side = bit_side(bits, node.len);
	flush_at(&mut node.children[side], bits, prefix_len, filter, out);
	collapse_if_redundant(slot);
}

#[inline]
fn bit_side(bits: u128, i: u32) -> usize {
	usize::from(bits.bit_at(i))
}

/// Bit mask with the top `n` bits (MSB-first) set.
fn top_mask(n: u32) -> u128 {
	if n == 0 {
		0
	} else if n >= 128 {
		u128::MAX
	} else {
		!0u128 << (128 - n)
	}
}

/// Does any bit in `[from, to)` (MSB-first indices) of `a` and `b` conflict
/// outside of `wildcard`'s don't-care bits?
fn range_conflict(a: u128, b: u128, wildcard: u128, from: u32, to: u32) -> bool {
	if from >= to {
		return false;
	}
	let mask = top_mask(to) & !top_mask(from);
	(a ^ b) & !wildcard & mask != 0
}

/// PATRICIA radix trie over one address family (§4.3).
///
/// `IPRadixTree` ([`crate::IPRadixTree`]) is this tree bound to
/// [`crate::family::Ipv6`].
#[derive(Debug)]
pub struct PatriciaTree<F: Family> {
	root: Option<Box<Node>>,
	len: usize,
	next_seq: u64,
	_family: PhantomData<F>,
}

impl<F: Family> Default for PatriciaTree<F> {
	fn default() -> Self {
		Self::new()
	}
}

impl<F: Family> PatriciaTree<F> {
	/// New, empty tree.
	pub fn new() -> Self {
		PatriciaTree {
			root: None,
			len: 0,
			next_seq: 0,
			_family: PhantomData,
		}
	}

	/// Number of [`Route`] records stored in the tree.
	pub fn len(&self) -> usize {
		self.len
	}

	/// Whether the tree holds no routes.
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Insert a new route at `prefix` with the given attributes (§4.3
	/// "Insert"). No deduplication: inserting the same `(prefix, attrs)`
	/// twice yields two distinct routes at the same node.
	pub fn add(&mut self, prefix: &str, attrs: AttrMap) -> Result<Route, Error> {
		let (bits, prefix_len) = F::parse_prefix(prefix)?;
		let bits = bits.mask_to_len(prefix_len).to_u128();
		let canonical = format_masked::<F>(bits, prefix_len);

		let seq = self.next_seq;
		self.next_seq += 1;
		let route = Route::new(canonical, attrs, seq, bits, prefix_len);

		insert_at(&mut self.root, bits, prefix_len, route.clone());
		self.len += 1;
		trace!("patricia tree: inserted {route}");
		Ok(route)
	}

	/// Longest-match lookup (§4.3 "Longest match"). `query` may be a bare
	/// address (treated as full width) or an explicit `"address/len"`.
	pub fn get(&self, query: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (bits, query_len) = F::parse_prefix(query)?;
		let bits = bits.to_u128();

		let mut best: Option<&Node> = None;
		let mut current = self.root.as_deref();
		while let Some(node) = current {
			let shared = node.bits.common_prefix_len(bits, node.len.min(query_len));
			if shared < node.len {
				break;
			}
			if !node.routes.is_empty() {
				best = Some(node);
			}
			if node.len >= query_len {
				break;
			}
			let side = bit_side(bits, node.len);
			current = node.children[side].as_deref();
		}

		let mut out = match best {
			Some(node) => node.routes.iter().filter(|r| matches_filter(r, filter)).cloned().collect(),
			None => Vec::new(),
		};
		sort_ascending(&mut out);
		Ok(out)
	}

	/// Whether `address` resolves to at least one route (`address in tree`).
	pub fn contains(&self, address: &str) -> Result<bool, Error> {
		Ok(!self.get(address, &AttrMap::new())?.is_empty())
	}

	/// `show` with no prefix: every route in the tree, filtered and sorted
	/// (§4.3 "Exact").
	pub fn show_all(&self, filter: &AttrMap) -> Vec<Route> {
		let mut out = Vec::new();
		if let Some(root) = &self.root {
			root.collect_all(filter, &mut out);
		}
		sort_ascending(&mut out);
		out
	}

	/// `show(prefix, as_root=False)`: routes attached exactly at `prefix`,
	/// or `[]` if no node sits there or it carries no routes.
	pub fn show_exact(&self, prefix: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (bits, prefix_len) = F::parse_prefix(prefix)?;
		let bits = bits.mask_to_len(prefix_len).to_u128();
		let mut out = match self.root.as_deref().and_then(|root| find_exact(root, bits, prefix_len)) {
			Some(node) => node.routes.iter().filter(|r| matches_filter(r, filter)).cloned().collect(),
			None => Vec::new(),
		};
		sort_ascending(&mut out);
		Ok(out)
	}

	/// `show(prefix, as_root=True)`: the node at `prefix` (whether or not it
	/// carries routes) plus every route in its subtree, filtered and sorted.
	/// Fails with [`Error::UnknownPrefix`] if no node exists at that prefix
	/// at all.
	pub fn show_subtree(&self, prefix: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (bits, prefix_len) = F::parse_prefix(prefix)?;
		let bits = bits.mask_to_len(prefix_len).to_u128();
		let canonical = format_masked::<F>(bits, prefix_len);
		let node = self
			.root
			.as_deref()
			.and_then(|root| find_exact(root, bits, prefix_len))
			.ok_or_else(|| Error::unknown_prefix(canonical.clone()))?;
		let mut out = Vec::new();
		node.collect_all(filter, &mut out);
		sort_ascending(&mut out);
		Ok(out)
	}

	/// Routes of the first ancestor of `prefix` that carries routes (§4.3
	/// "parent"). Returns `[]` if `prefix` is absent, carries no routes
	/// itself, or has no covering ancestor.
	pub fn parent(&self, prefix: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (bits, prefix_len) = F::parse_prefix(prefix)?;
		let bits = bits.mask_to_len(prefix_len).to_u128();
		let Some(root) = self.root.as_deref() else {
			return Ok(Vec::new());
		};

		let mut path = Vec::new();
		let mut current = root;
		loop {
			let shared = current.bits.common_prefix_len(bits, current.len.min(prefix_len));
			if shared < current.len {
				return Ok(Vec::new());
			}
			path.push(current);
			if current.len == prefix_len {
				break;
			}
			let side = bit_side(bits, current.len);
			match current.children[side].as_deref() {
				Some(child) => current = child,
				None => return Ok(Vec::new()),
			}
		}
		if path.last().unwrap().routes.is_empty() {
			return Ok(Vec::new());
		}

		for ancestor in path[..path.len() - 1].iter().rev() {
			if !ancestor.routes.is_empty() {
				let mut out: Vec<Route> = ancestor
					.routes
					.iter()
					.filter(|r| matches_filter(r, filter))
					.cloned()
					.collect();
				sort_ascending(&mut out);
				return Ok(out);
			}
		}
		Ok(Vec::new())
	}

	/// Routes of every strict descendant of `prefix` that carries routes,
	/// excluding `prefix` itself (§4.3 "children"). Fails with
	/// [`Error::UnknownPrefix`] if no node exists at `prefix`.
	pub fn children(&self, prefix: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (bits, prefix_len) = F::parse_prefix(prefix)?;
		let bits = bits.mask_to_len(prefix_len).to_u128();
		let canonical = format_masked::<F>(bits, prefix_len);
		let node = self
			.root
			.as_deref()
			.and_then(|root| find_exact(root, bits, prefix_len))
			.ok_or_else(|| Error::unknown_prefix(canonical.clone()))?;
		let mut out = Vec::new();
		node.collect_descendants(filter, &mut out);
		sort_ascending(&mut out);
		Ok(out)
	}

	/// Every route whose prefix is a proper prefix of, or equal to, `query`
	/// (§4.3 "match").
	pub fn match_(&self, query: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (bits, query_len) = F::parse_prefix(query)?;
		let bits = bits.to_u128();
		let mut out = Vec::new();
		if let Some(root) = &self.root {
			if root.len <= query_len && root.bits.common_prefix_len(bits, root.len) == root.len {
				root.collect_match(bits, query_len, filter, &mut out);
			}
		}
		sort_ascending(&mut out);
		Ok(out)
	}

	/// Wildcard-mask match (§4.3 "wcmatch"): a set wildcard bit means
	/// "don't care" at that position, across the whole compressed edge
	/// leading into each child, not just its branching bit.
	pub fn wcmatch(&self, address: &str, wildcard: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (addr_bits, _) = F::parse_prefix(address)?;
		let (wc_bits, _) = F::parse_prefix(wildcard)?;
		let addr_bits = addr_bits.to_u128();
		let wc_bits = wc_bits.to_u128();
		let mut out = Vec::new();
		if let Some(root) = &self.root {
			let to = root.len.min(F::WIDTH);
			if !range_conflict(root.bits, addr_bits, wc_bits, 0, to) {
				root.collect_wildcard(addr_bits, wc_bits, F::WIDTH, filter, &mut out);
			}
		}
		sort_ascending(&mut out);
		Ok(out)
	}

	/// Remove routes at `prefix` (all of them if `filter` is empty,
	/// otherwise only those whose attributes are a superset of `filter`),
	/// then collapse any node left with no routes (§4.3 "delete"). Fails
	/// with [`Error::UnknownPrefix`] if `prefix` is absent.
	pub fn delete(&mut self, prefix: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (bits, prefix_len) = F::parse_prefix(prefix)?;
		let bits = bits.mask_to_len(prefix_len).to_u128();
		let canonical = format_masked::<F>(bits, prefix_len);

		if self.root.as_deref().and_then(|root| find_exact(root, bits, prefix_len)).is_none() {
			return Err(Error::unknown_prefix(canonical.clone()));
		}

		let mut out = Vec::new();
		delete_at(&mut self.root, bits, prefix_len, filter, &mut out);
		self.len -= out.len();
		debug!("patricia tree: deleted {} route(s) at {canonical}", out.len());
		Ok(out)
	}

	/// Empty the whole tree (`prefix=None, attrs` empty), or remove every
	/// route passing `filter` and collapse empty nodes (`prefix=None,
	/// attrs` non-empty), or the same restricted to the subtree rooted at
	/// `prefix` (`prefix=Some`, including that node). Never fails — a
	/// missing `prefix` or route-free tree is simply a no-op (§4.3
	/// "flush").
	pub fn flush(&mut self, prefix: Option<&str>, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let Some(prefix) = prefix else {
			if filter.is_empty() {
				let removed = self.len;
				self.root = None;
				self.len = 0;
				debug!("patricia tree: flushed entire tree ({removed} route(s))");
				return Ok(Vec::new());
			}
			let mut out = Vec::new();
			flush_subtree(&mut self.root, filter, &mut out);
			self.len -= out.len();
			return Ok(out);
		};

		let (bits, prefix_len) = F::parse_prefix(prefix)?;
		let bits = bits.mask_to_len(prefix_len).to_u128();
		let mut out = Vec::new();
		flush_at(&mut self.root, bits, prefix_len, filter, &mut out);
		self.len -= out.len();
		Ok(out)
	}
}

impl<F: Family> IntoIterator for &PatriciaTree<F> {
	type Item = Route;
	type IntoIter = std::vec::IntoIter<Route>;

	/// Iterate all routes in descending prefix-length order, insertion
	/// order breaking ties (§4.3 "Iteration").
	fn into_iter(self) -> Self::IntoIter {
		let mut out = self.show_all(&AttrMap::new());
		sort_descending_length(&mut out);
		out.into_iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::family::Ipv4;
	use crate::route::AttrValue;

	fn attrs(pairs: &[(&str, &str)]) -> AttrMap {
		pairs.iter().map(|(k, v)| ((*k).to_owned(), AttrValue::from(*v))).collect()
	}

	#[test]
	fn insert_and_exact_lookup() {
		let mut tree: PatriciaTree<Ipv4> = PatriciaTree::new();
		tree.add("10.0.0.0/8", AttrMap::new()).unwrap();
		tree.add("10.1.0.0/16", AttrMap::new()).unwrap();
		assert_eq!(tree.len(), 2);
		assert_eq!(tree.show_exact("10.0.0.0/8", &AttrMap::new()).unwrap().len(), 1);
		assert_eq!(tree.show_exact("10.1.0.0/16", &AttrMap::new()).unwrap().len(), 1);
		assert!(tree.show_exact("10.2.0.0/16", &AttrMap::new()).unwrap().is_empty());
	}

	#[test]
	fn split_creates_branch_for_diverging_prefixes() {
		let mut tree: PatriciaTree<Ipv4> = PatriciaTree::new();
		tree.add("10.0.0.0/16", AttrMap::new()).unwrap();
		tree.add("10.1.0.0/16", AttrMap::new()).unwrap();
		// Neither prefix is an ancestor of the other; both must still be
		// present after the split that separates them onto two children
		// of a shared /15 branch node.
		assert_eq!(tree.show_exact("10.0.0.0/16", &AttrMap::new()).unwrap().len(), 1);
		assert_eq!(tree.show_exact("10.1.0.0/16", &AttrMap::new()).unwrap().len(), 1);
		assert!(tree.get("10.0.5.5", &AttrMap::new()).unwrap()[0].prefix() == "10.0.0.0/16");
	}

	#[test]
	fn longest_match_prefers_deepest_covering_route() {
		let mut tree: PatriciaTree<Ipv4> = PatriciaTree::new();
		tree.add("10.0.0.0/8", AttrMap::new()).unwrap();
		tree.add("10.1.0.0/16", AttrMap::new()).unwrap();
		let matched = tree.get("10.1.2.3", &AttrMap::new()).unwrap();
		assert_eq!(matched.len(), 1);
		assert_eq!(matched[0].prefix(), "10.1.0.0/16");
	}

	#[test]
	fn delete_collapses_single_child_branch() {
		let mut tree: PatriciaTree<Ipv4> = PatriciaTree::new();
		tree.add("10.0.0.0/16", AttrMap::new()).unwrap();
		tree.add("10.1.0.0/16", AttrMap::new()).unwrap();
		tree.delete("10.1.0.0/16", &AttrMap::new()).unwrap();
		assert_eq!(tree.len(), 1);
		// The branch node should have collapsed back down to a single
		// leaf at /16, not left dangling with one child.
		assert_eq!(tree.show_exact("10.0.0.0/16", &AttrMap::new()).unwrap().len(), 1);
	}

	#[test]
	fn flush_on_compressed_ancestor_removes_whole_subtree() {
		let mut tree: PatriciaTree<Ipv4> = PatriciaTree::new();
		tree.add("10.0.0.0/24", AttrMap::new()).unwrap();
		tree.add("10.0.1.0/24", AttrMap::new()).unwrap();
		// No node exists at exactly /16; flush must still walk through
		// the compressed edge and remove both descendants.
		let removed = tree.flush(Some("10.0.0.0/16"), &AttrMap::new()).unwrap();
		assert_eq!(removed.len(), 2);
		assert!(tree.is_empty());
	}

	#[test]
	fn filter_limits_delete_to_matching_routes() {
		let mut tree: PatriciaTree<Ipv4> = PatriciaTree::new();
		tree.add("10.0.0.0/8", attrs(&[("proto", "bgp")])).unwrap();
		tree.add("10.0.0.0/8", attrs(&[("proto", "static")])).unwrap();
		let removed = tree.delete("10.0.0.0/8", &attrs(&[("proto", "bgp")])).unwrap();
		assert_eq!(removed.len(), 1);
		assert_eq!(tree.len(), 1);
	}
}
