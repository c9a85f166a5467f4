//! TC handle encoding and decoding.
//!
//! TC handles are 32-bit values split into major:minor (16:16 bits). The kernel and the `tc`
//! tool render them as `major:minor` in lowercase hexadecimal without padding, e.g. `1:0`,
//! `1:a` or `ffff:ffff` for the root. Every identifier exported by this workspace goes through
//! this module so labels match what an operator sees with `tc -s qdisc show`.

use std::{fmt, str::FromStr};

/// Mask of the minor half of a handle.
pub const MINOR_MASK: u32 = 0x0000_FFFF;

/// The `TC_H_ROOT` handle, parent of every root qdisc.
pub const ROOT: u32 = 0xFFFF_FFFF;

/// The `TC_H_INGRESS` handle, parent of ingress and clsact qdiscs.
pub const INGRESS: u32 = 0xFFFF_FFF1;

/// Filter block of the ingress side of an `ingress` or `clsact` qdisc.
pub const INGRESS_BLOCK: u32 = 0xFFFF_FFF2;

/// Filter block of the egress side of a `clsact` qdisc.
pub const EGRESS_BLOCK: u32 = 0xFFFF_FFF3;

/// Split a packed handle into its `(major, minor)` components.
///
/// ```
/// use tcx_common::handle;
/// assert_eq!(handle::decode(0x0001_000C), (1, 12));
/// ```
#[inline]
pub const fn decode(handle: u32) -> (u16, u16) {
    ((handle >> 16) as u16, (handle & MINOR_MASK) as u16)
}

/// Pack `(major, minor)` into a handle.
#[inline]
pub const fn encode(major: u16, minor: u16) -> u32 {
    ((major as u32) << 16) | minor as u32
}

/// Render a handle in its canonical `major:minor` form.
///
/// ```
/// use tcx_common::handle;
/// assert_eq!(handle::format(0x0001_0000), "1:0");
/// assert_eq!(handle::format(0xFFFF_FFFF), "ffff:ffff");
/// ```
pub fn format(handle: u32) -> String {
    Handle(handle).to_string()
}

/// Parse a handle rendered by [`format`]. Returns `None` for anything else.
pub fn parse(s: &str) -> Option<u32> {
    let (major, minor) = s.split_once(':')?;
    let major = u16::from_str_radix(major, 16).ok()?;
    let minor = u16::from_str_radix(minor, 16).ok()?;

    Some(encode(major, minor))
}

/// A packed TC handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u32);

impl Handle {
    /// The major half of the handle.
    #[inline]
    pub const fn major(self) -> u16 {
        decode(self.0).0
    }

    /// The minor half of the handle.
    #[inline]
    pub const fn minor(self) -> u16 {
        decode(self.0).1
    }

    /// Whether this is the `TC_H_ROOT` handle.
    #[inline]
    pub const fn is_root(self) -> bool {
        self.0 == ROOT
    }
}

impl From<u32> for Handle {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Handle> for u32 {
    fn from(value: Handle) -> Self {
        value.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}:{:x}", self.major(), self.minor())
    }
}

/// Error returned when parsing a [`Handle`] from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseHandleError(String);

impl fmt::Display for ParseHandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid tc handle: {:?}", self.0)
    }
}

impl std::error::Error for ParseHandleError {}

impl FromStr for Handle {
    type Err = ParseHandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s).map(Self).ok_or_else(|| ParseHandleError(s.to_string()))
    }
}
