//! Structural flags carried by every index entry

use binrw::{BinRead, BinWrite};
use std::fmt;

/// Entry flags stored at offset 0x0C of an index entry
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[brw(little)]
pub struct IndexEntryFlags {
    /// Raw flag value
    pub value: u16,
}

impl IndexEntryFlags {
    /// Plain record
    pub const NONE: u16 = 0x0000;

    /// Entry owns a child block; its VCN is stored in the last 8 bytes
    pub const HAS_CHILD: u16 = 0x0001;

    /// Terminating entry of a node, carries no key or data
    pub const IS_END: u16 = 0x0002;

    /// Create new entry flags from raw value
    pub const fn new(value: u16) -> Self {
        Self { value }
    }

    /// Check if flag is set
    pub const fn has(&self, flag: u16) -> bool {
        (self.value & flag) != 0
    }

    /// Set flag
    pub fn set(&mut self, flag: u16) {
        self.value |= flag;
    }

    /// Clear flag
    pub fn clear(&mut self, flag: u16) {
        self.value &= !flag;
    }

    /// Check if the entry owns a child block
    pub const fn has_child(&self) -> bool {
        self.has(Self::HAS_CHILD)
    }

    /// Check if the entry terminates its node
    pub const fn is_end(&self) -> bool {
        self.has(Self::IS_END)
    }
}

impl fmt::Display for IndexEntryFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.has_child() {
            names.push("HAS_CHILD");
        }
        if self.is_end() {
            names.push("IS_END");
        }
        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join(" | "))
        }
    }
}
