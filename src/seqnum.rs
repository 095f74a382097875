//! Modular arithmetic over the 32-bit sequence number space.
//!
//! All sequence/ack comparisons in the transport go through here instead of
//! raw `u32` arithmetic, so wraparound at 2**32 is handled in exactly one
//! place.

use std::fmt;
use std::ops::{Add, Sub};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeqNum(pub u32);

impl SeqNum {
    pub const ZERO: SeqNum = SeqNum(0);

    pub fn new(value: u32) -> Self {
        SeqNum(value)
    }

    /// `self + n`, wrapping at 2**32.
    pub fn add(self, n: u32) -> SeqNum {
        SeqNum(self.0.wrapping_add(n))
    }

    /// `self - n`, wrapping at 2**32.
    pub fn sub(self, n: u32) -> SeqNum {
        SeqNum(self.0.wrapping_sub(n))
    }

    /// Unsigned modular distance from `self` forward to `other`, i.e. the
    /// number of increments needed to walk `self` up to `other`.
    pub fn diff(self, other: SeqNum) -> u32 {
        other.0.wrapping_sub(self.0)
    }

    /// True iff `self` lies in the half-open interval `[base, top)` modulo
    /// 2**32, including the wraparound case where `top` has wrapped below
    /// `base`.
    pub fn in_window(self, base: SeqNum, top: SeqNum) -> bool {
        if top.0 < base.0 {
            self.0 >= base.0 || self.0 < top.0
        } else {
            self.0 >= base.0 && self.0 < top.0
        }
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SeqNum {
    fn from(value: u32) -> Self {
        SeqNum(value)
    }
}

impl From<SeqNum> for u32 {
    fn from(value: SeqNum) -> Self {
        value.0
    }
}

impl Add<u32> for SeqNum {
    type Output = SeqNum;
    fn add(self, rhs: u32) -> SeqNum {
        self.add(rhs)
    }
}

impl Sub<u32> for SeqNum {
    type Output = SeqNum;
    fn sub(self, rhs: u32) -> SeqNum {
        self.sub(rhs)
    }
}
