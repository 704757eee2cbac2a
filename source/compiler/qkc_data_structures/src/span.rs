// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use miette::SourceSpan;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A region between two source code positions. Spans are the half-open interval `[lo, hi)`. The
/// offsets are absolute within a source map.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Span {
    /// The offset of the first byte.
    pub lo: u32,
    /// The offset immediately following the last byte.
    pub hi: u32,
}

impl Span {
    #[must_use]
    pub fn new(lo: u32, hi: u32) -> Self {
        assert!(lo <= hi, "span start {lo} should not exceed its end {hi}");
        Self { lo, hi }
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "[{}-{}]", self.lo, self.hi)
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        Self::from((value.lo as usize)..(value.hi as usize))
    }
}
