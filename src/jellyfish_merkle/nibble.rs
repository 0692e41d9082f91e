// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

// Copyright (c) The Starcoin Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! A nibble is one hex digit (4 bits), the unit [`super::node_type::InternalNode`] branches on:
//! each internal node has up to 16 children, indexed 0x0..=0xf.

#[cfg(any(test, feature = "fuzzing"))]
use proptest::prelude::*;
use std::fmt;

/// A value in `0..16`. The `From<u8>` impl truncates to the low 4 bits rather than panicking,
/// since every caller in this crate derives nibbles from splitting a byte in half.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) struct Nibble(u8);

impl From<u8> for Nibble {
    fn from(value: u8) -> Self {
        Self(value & 0x0f)
    }
}

impl From<Nibble> for u8 {
    fn from(value: Nibble) -> Self {
        value.0
    }
}

impl From<Nibble> for usize {
    fn from(value: Nibble) -> Self {
        value.0 as usize
    }
}

impl fmt::LowerHex for Nibble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl fmt::Display for Nibble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(self, f)
    }
}

#[cfg(any(test, feature = "fuzzing"))]
impl Arbitrary for Nibble {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (0u8..16).prop_map(Nibble::from).boxed()
    }
}
