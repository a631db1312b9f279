//! Route records: an immutable prefix plus a mutable attribute map.

use std::fmt;

use indexmap::IndexMap;

use crate::error::Error;

/// A scalar attribute value.
///
/// Design note §9 calls for a tagged-variant value type; string/int/bool
/// cover every use case shown in the end-to-end scenarios.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttrValue {
	/// A string attribute value.
	Str(String),
	/// An integer attribute value.
	Int(i64),
	/// A boolean attribute value.
	Bool(bool),
}

impl fmt::Display for AttrValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AttrValue::Str(s) => write!(f, "{s}"),
			AttrValue::Int(i) => write!(f, "{i}"),
			AttrValue::Bool(b) => write!(f, "{b}"),
		}
	}
}

impl From<&str> for AttrValue {
	fn from(value: &str) -> Self {
		AttrValue::Str(value.to_owned())
	}
}

impl From<String> for AttrValue {
	fn from(value: String) -> Self {
		AttrValue::Str(value)
	}
}

impl From<i64> for AttrValue {
	fn from(value: i64) -> Self {
		AttrValue::Int(value)
	}
}

impl From<bool> for AttrValue {
	fn from(value: bool) -> Self {
		AttrValue::Bool(value)
	}
}

/// Ordered `name -> value` attribute map, as carried by a [`Route`] and by
/// query attribute filters (§4.6).
pub type AttrMap = IndexMap<String, AttrValue>;

/// An attribute record attached to a stored prefix.
///
/// `prefix` is fixed at construction (`set_prefix` always fails with
/// [`Error::ImmutableAttribute`], §4.1); attributes may be read, written, or
/// removed freely.
///
/// Two routes are never considered equal by value: `Route` intentionally
/// does not implement [`PartialEq`]. Each call to
/// [`crate::BinaryTree::add`]/[`crate::PatriciaTree::add`] allocates a new,
/// distinct `Route`, so inserting the same `(prefix, attrs)` twice yields
/// two routes that coexist at the same node (§3).
///
/// When the `serde` feature is on, `Route` (de)serializes through its
/// rendered mapping form — `prefix` plus `attrs` in insertion order — not
/// through its raw fields: `seq`/`network`/`prefix_len` are sort/iteration
/// bookkeeping, not part of the public data model of §3, and are rebuilt
/// (as `0`) on deserialize rather than carried across the wire.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "RouteData", from = "RouteData"))]
pub struct Route {
	prefix: String,
	attrs: AttrMap,
	// Sort/iteration bookkeeping, not part of the public data model.
	pub(crate) seq: u64,
	pub(crate) network: u128,
	pub(crate) prefix_len: u32,
}

impl Route {
	pub(crate) fn new(prefix: String, attrs: AttrMap, seq: u64, network: u128, prefix_len: u32) -> Self {
		Route {
			prefix,
			attrs,
			seq,
			network,
			prefix_len,
		}
	}

	/// The canonical `"address/len"` text this route was stored under.
	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// Attempt to overwrite `prefix`; always fails (§4.1).
	pub fn set_prefix(&mut self, _prefix: &str) -> Result<(), Error> {
		Err(Error::ImmutableAttribute)
	}

	/// Read an attribute by name.
	pub fn get(&self, name: &str) -> Option<&AttrValue> {
		self.attrs.get(name)
	}

	/// Set (add or replace) an attribute.
	pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
		self.attrs.insert(name.into(), value.into());
	}

	/// Remove an attribute, returning its previous value if present.
	pub fn remove(&mut self, name: &str) -> Option<AttrValue> {
		self.attrs.shift_remove(name)
	}

	/// Iterate `(name, value)` pairs in insertion order (attributes only,
	/// `prefix` excluded — see [`Route::to_mapping`] for the form with
	/// `prefix` first).
	pub fn attrs(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
		self.attrs.iter().map(|(k, v)| (k.as_str(), v))
	}

	/// Convert to an ordered mapping with `prefix` first, then attributes in
	/// insertion order (§4.1, §6).
	pub fn to_mapping(&self) -> Vec<(String, String)> {
		let mut out = Vec::with_capacity(1 + self.attrs.len());
		out.push(("prefix".to_owned(), self.prefix.clone()));
		for (k, v) in &self.attrs {
			out.push((k.clone(), v.to_string()));
		}
		out
	}
}

/// Wire shape for [`Route`] (§6 "rendered mapping form"): `prefix` plus
/// `attrs` in insertion order, omitting the sort/iteration bookkeeping
/// fields that live on `Route` itself.
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct RouteData {
	prefix: String,
	#[serde(default)]
	attrs: AttrMap,
}

#[cfg(feature = "serde")]
impl From<Route> for RouteData {
	fn from(route: Route) -> Self {
		RouteData {
			prefix: route.prefix,
			attrs: route.attrs,
		}
	}
}

#[cfg(feature = "serde")]
impl From<RouteData> for Route {
	fn from(data: RouteData) -> Self {
		Route::new(data.prefix, data.attrs, 0, 0, 0)
	}
}

impl fmt::Display for Route {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Route(prefix={}", self.prefix)?;
		for (k, v) in &self.attrs {
			write!(f, ", {k}={v}")?;
		}
		write!(f, ")")
	}
}

/// Does query attribute map `q` match route attribute map `r`? (§4.6)
///
/// `q` matches iff for every `(k, v)` in `q`, `r` contains `k` with an equal
/// value. Extra attributes in `r` are irrelevant; an empty `q` matches every
/// route.
pub(crate) fn matches_filter(route: &Route, filter: &AttrMap) -> bool {
	filter
		.iter()
		.all(|(k, v)| route.attrs.get(k) == Some(v))
}

/// Is `r`'s attribute map a superset of `filter`? Used by `delete`/`flush`
/// (§4.2) — identical predicate to [`matches_filter`], named separately
/// because the spec calls it out as its own operation (§4.6).
pub(crate) fn is_superset(route: &Route, filter: &AttrMap) -> bool {
	matches_filter(route, filter)
}

/// Drain every route from `routes` whose attributes are a superset of
/// `filter` into `out`; `filter` empty drains everything. Shared by
/// [`crate::binary_tree`]'s and [`crate::patricia`]'s `delete`/`flush`.
pub(crate) fn remove_matching(routes: &mut Vec<Route>, filter: &AttrMap, out: &mut Vec<Route>) {
	if filter.is_empty() {
		out.append(routes);
		return;
	}
	let mut kept = Vec::with_capacity(routes.len());
	for route in routes.drain(..) {
		if is_superset(&route, filter) {
			out.push(route);
		} else {
			kept.push(route);
		}
	}
	*routes = kept;
}
