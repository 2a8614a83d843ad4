//! Function property words.
//!
//! A `FuncProps` value records what the property solver has proven about a
//! procedure: whether it is const, pure, nothrow and/or malloc, whether its
//! body contains a control-flow loop, and whether the value is only a
//! tentative intermediate result of an in-flight recursive analysis.
//!
//! `const` semantically implies `pure`, but the bits are stored
//! independently; the solver only ever sets the strongest applicable bit.

use core::fmt;
use core::ops::BitOr;

/// Property bits for a procedure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FuncProps {
    bits: u8,
}

/// Deterministic in its arguments and reads no memory at all.
const BIT_CONST: u8 = 0b0000_0001;
/// Reads non-volatile memory only; no writes, no other visible effects.
const BIT_PURE: u8 = 0b0000_0010;
/// Cannot raise an exception.
const BIT_NOTHROW: u8 = 0b0000_0100;
/// Every returned value is freshly allocated and unaliased.
const BIT_MALLOC: u8 = 0b0000_1000;
/// The body contains a control-flow loop that might not terminate.
const BIT_HAS_LOOP: u8 = 0b0001_0000;
/// Result of an unfinished recursive analysis; must not be persisted.
const BIT_TENTATIVE: u8 = 0b0010_0000;

impl FuncProps {
    /// The bottom element: no property is known.
    pub const NONE: Self = Self { bits: 0 };
    /// The `const` property.
    pub const CONST: Self = Self { bits: BIT_CONST };
    /// The `pure` property.
    pub const PURE: Self = Self { bits: BIT_PURE };
    /// The `nothrow` property.
    pub const NOTHROW: Self = Self { bits: BIT_NOTHROW };
    /// The `malloc` property.
    pub const MALLOC: Self = Self { bits: BIT_MALLOC };
    /// The has-loop marker.
    pub const HAS_LOOP: Self = Self { bits: BIT_HAS_LOOP };
    /// The tentative marker.
    pub const TENTATIVE: Self = Self { bits: BIT_TENTATIVE };

    /// Does `self` contain every bit of `other`?
    pub fn contains(self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }

    /// Remove all bits of `other` from `self`.
    pub fn without(self, other: Self) -> Self {
        Self {
            bits: self.bits & !other.bits,
        }
    }

    /// Keep only the bits of `other`.
    pub fn mask(self, other: Self) -> Self {
        Self {
            bits: self.bits & other.bits,
        }
    }

    /// Is this the bottom element, ignoring the tentative marker?
    pub fn is_bottom(self) -> bool {
        self.bits & !BIT_TENTATIVE == 0
    }

    /// Is the tentative marker set?
    pub fn is_tentative(self) -> bool {
        self.bits & BIT_TENTATIVE != 0
    }

    /// Is the const bit set?
    pub fn is_const(self) -> bool {
        self.bits & BIT_CONST != 0
    }

    /// Is the pure bit set?
    pub fn is_pure(self) -> bool {
        self.bits & BIT_PURE != 0
    }

    /// Is the nothrow bit set?
    pub fn is_nothrow(self) -> bool {
        self.bits & BIT_NOTHROW != 0
    }

    /// Is the malloc bit set?
    pub fn is_malloc(self) -> bool {
        self.bits & BIT_MALLOC != 0
    }

    /// Is the has-loop marker set?
    pub fn has_loop(self) -> bool {
        self.bits & BIT_HAS_LOOP != 0
    }

    /// Combine two results of independent memory-chain walks.
    ///
    /// If either side is bottom the result is bottom. Otherwise the
    /// numerically larger word wins, which for the words the const/pure
    /// walk produces means the *weaker* guarantee survives: combining a
    /// const path with a pure path yields pure. The tentative marker of
    /// either side is carried over into a non-bottom result.
    pub fn max(self, other: Self) -> Self {
        let tentative = (self.bits | other.bits) & BIT_TENTATIVE;
        let a = self.bits & !BIT_TENTATIVE;
        let b = other.bits & !BIT_TENTATIVE;
        if a == 0 || b == 0 {
            return Self::NONE;
        }
        Self {
            bits: a.max(b) | tentative,
        }
    }

    /// Fold one call site's contribution into an accumulating result:
    /// property bits are intersected, the tentative marker is unioned.
    pub fn update(self, other: Self) -> Self {
        let tentative = (self.bits | other.bits) & BIT_TENTATIVE;
        Self {
            bits: (self.bits & other.bits & !BIT_TENTATIVE) | tentative,
        }
    }
}

impl BitOr for FuncProps {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            bits: self.bits | rhs.bits,
        }
    }
}

impl fmt::Display for FuncProps {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut sep = "";
        for (bit, name) in [
            (BIT_CONST, "const"),
            (BIT_PURE, "pure"),
            (BIT_NOTHROW, "nothrow"),
            (BIT_MALLOC, "malloc"),
            (BIT_HAS_LOOP, "has_loop"),
            (BIT_TENTATIVE, "tentative"),
        ] {
            if self.bits & bit != 0 {
                write!(f, "{sep}{name}")?;
                sep = "+";
            }
        }
        if self.bits == 0 {
            write!(f, "none")?;
        }
        Ok(())
    }
}
