//! Bitmask encoding of the HTTP methods a route accepts.
//!
//! # Design Decisions
//! - One bit per canonical method, canonical order GET, HEAD, POST, PUT,
//!   PATCH, DELETE, CONNECT, OPTIONS, TRACE
//! - Decoding walks the canonical table once, so output order is fixed and
//!   no method appears twice
//! - Composite masks are memoized; a memo miss decodes and yields the same result

use std::borrow::Cow;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use axum::http::Method;

use crate::error::WebError;

/// Set of HTTP methods, encoded as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MethodSet(u32);

impl MethodSet {
    pub const GET: MethodSet = MethodSet(1 << 0);
    pub const HEAD: MethodSet = MethodSet(1 << 1);
    pub const POST: MethodSet = MethodSet(1 << 2);
    pub const PUT: MethodSet = MethodSet(1 << 3);
    pub const PATCH: MethodSet = MethodSet(1 << 4);
    pub const DELETE: MethodSet = MethodSet(1 << 5);
    pub const CONNECT: MethodSet = MethodSet(1 << 6);
    pub const OPTIONS: MethodSet = MethodSet(1 << 7);
    pub const TRACE: MethodSet = MethodSet(1 << 8);

    /// GET and POST, the common form-handling pair.
    pub const GET_POST: MethodSet = MethodSet(Self::GET.0 | Self::POST.0);

    /// Every canonical method.
    pub const ANY: MethodSet = MethodSet((1 << 9) - 1);

    /// The empty set.
    pub const NONE: MethodSet = MethodSet(0);

    /// Wrap a raw mask. Bits outside the canonical range are ignored on decode.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw mask value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 & Self::ANY.0 == 0
    }

    /// Single-bit set for a method name. Names are matched case-sensitively.
    pub fn encode(name: &str) -> Result<MethodSet, WebError> {
        CANONICAL
            .iter()
            .find(|(_, canonical)| *canonical == name)
            .map(|(set, _)| *set)
            .ok_or_else(|| WebError::InvalidMethod(name.to_string()))
    }

    /// Method names whose bits are set, in canonical order.
    pub fn decode(self) -> Vec<&'static str> {
        CANONICAL
            .iter()
            .filter(|(set, _)| self.0 & set.0 == set.0)
            .map(|(_, name)| *name)
            .collect()
    }

    /// Memoized [`decode`](Self::decode).
    pub fn names(self) -> Cow<'static, [&'static str]> {
        match MEMO.iter().find(|(bits, _)| *bits == self.0) {
            Some((_, names)) => Cow::Borrowed(*names),
            None => Cow::Owned(self.decode()),
        }
    }

    /// Decoded set as `http::Method` values.
    pub fn methods(self) -> Vec<Method> {
        self.names()
            .iter()
            .filter_map(|name| Method::from_bytes(name.as_bytes()).ok())
            .collect()
    }

    /// Returns true if `method` is one of the canonical methods in this set.
    pub fn contains(self, method: &Method) -> bool {
        match MethodSet::encode(method.as_str()) {
            Ok(bit) => self.0 & bit.0 != 0,
            Err(_) => false,
        }
    }
}

const CANONICAL: [(MethodSet, &str); 9] = [
    (MethodSet::GET, "GET"),
    (MethodSet::HEAD, "HEAD"),
    (MethodSet::POST, "POST"),
    (MethodSet::PUT, "PUT"),
    (MethodSet::PATCH, "PATCH"),
    (MethodSet::DELETE, "DELETE"),
    (MethodSet::CONNECT, "CONNECT"),
    (MethodSet::OPTIONS, "OPTIONS"),
    (MethodSet::TRACE, "TRACE"),
];

const MEMO: [(u32, &[&str]); 11] = [
    (MethodSet::GET.0, &["GET"]),
    (MethodSet::HEAD.0, &["HEAD"]),
    (MethodSet::POST.0, &["POST"]),
    (MethodSet::PUT.0, &["PUT"]),
    (MethodSet::PATCH.0, &["PATCH"]),
    (MethodSet::DELETE.0, &["DELETE"]),
    (MethodSet::CONNECT.0, &["CONNECT"]),
    (MethodSet::OPTIONS.0, &["OPTIONS"]),
    (MethodSet::TRACE.0, &["TRACE"]),
    (MethodSet::GET_POST.0, &["GET", "POST"]),
    (
        MethodSet::ANY.0,
        &["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "CONNECT", "OPTIONS", "TRACE"],
    ),
];

impl BitOr for MethodSet {
    type Output = MethodSet;

    fn bitor(self, rhs: MethodSet) -> MethodSet {
        MethodSet(self.0 | rhs.0)
    }
}

impl BitOrAssign for MethodSet {
    fn bitor_assign(&mut self, rhs: MethodSet) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_canonical_order() {
        let set = MethodSet::TRACE | MethodSet::GET | MethodSet::DELETE;
        assert_eq!(set.decode(), vec!["GET", "DELETE", "TRACE"]);
        assert!(MethodSet::NONE.decode().is_empty());
    }

    #[test]
    fn test_composites_match_incremental() {
        assert_eq!(
            (MethodSet::GET | MethodSet::POST).decode(),
            MethodSet::GET_POST.decode()
        );

        let mut all = MethodSet::NONE;
        for (set, _) in CANONICAL {
            all |= set;
        }
        assert_eq!(all, MethodSet::ANY);
        assert_eq!(all.decode(), MethodSet::ANY.decode());
        assert_eq!(MethodSet::ANY.decode().len(), 9);
    }

    #[test]
    fn test_overlapping_composites_do_not_duplicate() {
        let set = MethodSet::GET_POST | MethodSet::GET | MethodSet::ANY;
        let names = set.decode();
        assert_eq!(names.len(), 9);
        assert_eq!(names, MethodSet::ANY.decode());
    }

    #[test]
    fn test_memo_agrees_with_decode_for_every_mask() {
        for bits in 0..(1u32 << 9) {
            let set = MethodSet::from_bits(bits);
            assert_eq!(set.names().as_ref(), set.decode().as_slice(), "mask {bits:#b}");
        }
        // Bits outside the canonical range never leak into the output.
        let noisy = MethodSet::from_bits(MethodSet::GET.bits() | (1 << 20));
        assert_eq!(noisy.names().as_ref(), ["GET"]);
    }

    #[test]
    fn test_encode() {
        assert_eq!(MethodSet::encode("PATCH").unwrap(), MethodSet::PATCH);
        assert_eq!(MethodSet::encode("OPTIONS").unwrap(), MethodSet::OPTIONS);
        assert!(matches!(MethodSet::encode("FETCH"), Err(WebError::InvalidMethod(m)) if m == "FETCH"));
        assert!(MethodSet::encode("get").is_err());
    }

    #[test]
    fn test_contains_and_display() {
        let set = MethodSet::GET_POST;
        assert!(set.contains(&Method::GET));
        assert!(set.contains(&Method::POST));
        assert!(!set.contains(&Method::PUT));
        assert!(!MethodSet::ANY.contains(&Method::from_bytes(b"PURGE").unwrap()));
        assert_eq!(set.to_string(), "GET, POST");
        assert_eq!(set.methods(), vec![Method::GET, Method::POST]);
    }
}
