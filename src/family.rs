//! Fixed-width bit strings and the IPv4 / IPv6 address codec.
//!
//! Per design note §9, prefix bits are stored as fixed-width unsigned words
//! (32 for IPv4, 128 for IPv6) and compared by shifting + XOR + leading-zero
//! count rather than as byte arrays, so splits and comparisons work at
//! arbitrary bit offsets, not just byte boundaries.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::Error;

mod sealed {
	pub trait Sealed {}
}

/// Primitive unsigned-integer operations needed to treat a fixed-width word
/// as a bit string indexed from the most significant bit (bit 0 = MSB).
pub(crate) trait UintBits:
	Copy + Clone + Eq + Ord + fmt::Debug + Default + Send + Sync + 'static
{
	const WIDTH: u32;

	fn bit_at(self, i: u32) -> bool;
	fn flip_bit(self, i: u32) -> Self;
	fn mask_to_len(self, len: u32) -> Self;
	fn common_prefix_len(self, other: Self, max_len: u32) -> u32;
	fn to_u128(self) -> u128;
	fn from_u128_lossless(v: u128) -> Self;
}

macro_rules! impl_uint_bits {
	($t:ty, $width:expr) => {
		impl UintBits for $t {
			const WIDTH: u32 = $width;

			#[inline]
			fn bit_at(self, i: u32) -> bool {
				debug_assert!(i < Self::WIDTH);
				(self >> (Self::WIDTH - 1 - i)) & 1 == 1
			}

			#[inline]
			fn flip_bit(self, i: u32) -> Self {
				debug_assert!(i < Self::WIDTH);
				self ^ (1 << (Self::WIDTH - 1 - i))
			}

			#[inline]
			fn mask_to_len(self, len: u32) -> Self {
				if len >= Self::WIDTH {
					self
				} else if len == 0 {
					0
				} else {
					let shift = Self::WIDTH - len;
					(self >> shift) << shift
				}
			}

			#[inline]
			fn common_prefix_len(self, other: Self, max_len: u32) -> u32 {
				let diff = self ^ other;
				let matching = if diff == 0 {
					Self::WIDTH
				} else {
					diff.leading_zeros()
				};
				matching.min(max_len)
			}

			// Both trees normalize every family's bits into a common `u128`
			// word so `Node`/child-index logic is width-generic; the value is
			// left-aligned (MSB of the address = MSB of the word) so
			// `bit_at`/`common_prefix_len`, which always index from bit 0 =
			// MSB, agree between the native and normalized representations.
			#[inline]
			fn to_u128(self) -> u128 {
				(self as u128) << (128 - Self::WIDTH)
			}

			#[inline]
			fn from_u128_lossless(v: u128) -> Self {
				(v >> (128 - Self::WIDTH)) as Self
			}
		}
	};
}

impl_uint_bits!(u32, 32);
impl_uint_bits!(u128, 128);

/// Address family a tree is bound to.
///
/// Sealed: only [`Ipv4`] and [`Ipv6`] implement it. This keeps
/// [`crate::BinaryTree`] and [`crate::PatriciaTree`] generic over the two
/// concrete families while single-sourcing the bit-level algorithms, per
/// design note §9 ("two trees, one contract").
pub trait Family: sealed::Sealed + Copy + Clone + Eq + fmt::Debug + 'static {
	/// Fixed-width word backing this family's prefix bits.
	#[doc(hidden)]
	type Bits: UintBits;

	/// Bit width of the family (32 for IPv4, 128 for IPv6).
	const WIDTH: u32;
	/// Human-readable family name, used in [`Error::FamilyMismatch`].
	const NAME: &'static str;

	/// Parse `"A.B.C.D/N"` / `"A.B.C.D"` (IPv4) or `"hex::colon/N"` / bare
	/// IPv6 text into `(bits, prefix_len)`. Bits beyond `prefix_len` are
	/// *not* masked here; callers mask on insertion (§3).
	fn parse_prefix(text: &str) -> Result<(Self::Bits, u32), Error>;

	/// Render `bits` masked to `prefix_len` as canonical `"address/len"` text.
	fn format_prefix(bits: Self::Bits, prefix_len: u32) -> String;
}

/// IPv4 address family marker (32-bit prefixes).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Ipv4;

impl sealed::Sealed for Ipv4 {}

impl Family for Ipv4 {
	type Bits = u32;

	const WIDTH: u32 = 32;
	const NAME: &'static str = "IPv4";

	fn parse_prefix(text: &str) -> Result<(u32, u32), Error> {
		let (addr_text, len) = split_len(text, 32)?;
		match addr_text.parse::<Ipv4Addr>() {
			Ok(addr) => Ok((u32::from(addr), len)),
			Err(_) => {
				if text.contains(':') {
					Err(Error::family_mismatch(text, Self::NAME))
				} else {
					Err(Error::invalid(text))
				}
			},
		}
	}

	fn format_prefix(bits: u32, prefix_len: u32) -> String {
		format!("{}/{}", Ipv4Addr::from(bits), prefix_len)
	}
}

/// IPv6 address family marker (128-bit prefixes).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Ipv6;

impl sealed::Sealed for Ipv6 {}

impl Family for Ipv6 {
	type Bits = u128;

	const WIDTH: u32 = 128;
	const NAME: &'static str = "IPv6";

	fn parse_prefix(text: &str) -> Result<(u128, u32), Error> {
		let (addr_text, len) = split_len(text, 128)?;
		match addr_text.parse::<Ipv6Addr>() {
			Ok(addr) => Ok((u128::from(addr), len)),
			Err(_) => {
				if !text.contains(':') && text.contains('.') {
					Err(Error::family_mismatch(text, Self::NAME))
				} else {
					Err(Error::invalid(text))
				}
			},
		}
	}

	fn format_prefix(bits: u128, prefix_len: u32) -> String {
		format!("{}/{}", Ipv6Addr::from(bits), prefix_len)
	}
}

/// Narrow a `u128`-normalized value back to the family's native bit width.
/// Every `Family::Bits` is either `u32` or `u128`; both are reachable from a
/// `u128` that was produced by `UintBits::to_u128` on a value of that same
/// width, so the conversion is exact.
pub(crate) fn narrow<F: Family>(bits: u128) -> F::Bits {
	F::Bits::from_u128_lossless(bits)
}

/// Render a normalized, already-masked `u128` value as canonical
/// `"address/len"` text. Shared by [`crate::binary_tree`] and
/// [`crate::patricia`] so both trees format prefixes identically.
pub(crate) fn format_masked<F: Family>(bits: u128, prefix_len: u32) -> String {
	F::format_prefix(narrow::<F>(bits), prefix_len)
}

/// Split `"addr/len"` into `(addr_text, len)`; a bare address is treated as
/// `/full_width`, per the open question resolved in design note §9.
fn split_len(text: &str, width: u32) -> Result<(&str, u32), Error> {
	match text.split_once('/') {
		Some((addr, len_text)) => {
			let len: u32 = len_text.parse().map_err(|_| Error::invalid(text))?;
			if len > width {
				return Err(Error::invalid(text));
			}
			Ok((addr, len))
		},
		None => Ok((text, width)),
	}
}
