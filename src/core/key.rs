//! Variable keys.
//!
//! A [`Key`] is an opaque 64-bit identifier of one unknown in the values store. A
//! [`Symbol`] packs a character and an index into a key (`l7` for landmark 7), which
//! keeps diagnostics readable.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const CHR_BITS: u32 = 8;
const INDEX_BITS: u32 = u64::BITS - CHR_BITS;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// Opaque identifier of an unknown variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Key(pub u64);

impl From<u64> for Key {
    fn from(value: u64) -> Self {
        Key(value)
    }
}

impl fmt::Display for Key {
    /// Keys carrying an alphabetic symbol character print as that symbol,
    /// all other keys print as the raw integer.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = Symbol::from(*self);
        if symbol.chr().is_ascii_alphabetic() {
            write!(f, "{symbol}")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Character + index view of a [`Key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    chr: u8,
    index: u64,
}

impl Symbol {
    /// Create a symbol. Only the low byte of `chr` is kept, so it should be ASCII,
    /// and `index` is truncated to 56 bits.
    pub fn new(chr: char, index: u64) -> Self {
        Self {
            chr: (u32::from(chr) & 0xff) as u8,
            index: index & INDEX_MASK,
        }
    }

    pub fn chr(&self) -> char {
        char::from(self.chr)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn key(&self) -> Key {
        Key((u64::from(self.chr) << INDEX_BITS) | self.index)
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        symbol.key()
    }
}

impl From<Key> for Symbol {
    fn from(key: Key) -> Self {
        Self {
            chr: (key.0 >> INDEX_BITS) as u8,
            index: key.0 & INDEX_MASK,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.chr(), self.index)
    }
}
