//! Register - Register identifiers for the RGVM register file
//!
//! ## Register Set
//!
//! ```text
//! General purpose (0x00-0x1F): r0-r31
//! Special         (0x20-0x24): pc, lr, ad, at, sp
//! ```
//!
//! The identifier byte space is contiguous, so a register's byte value
//! doubles as its index into the register file. Any byte above 0x24 is
//! not a register; `Reg` can only be constructed from valid bytes, so
//! downstream code (register file, execution) is total on `Reg`.

use std::fmt;

/// A validated register identifier (one byte, `0x00..=0x24`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg(u8);

impl Reg {
    /// Program counter
    pub const PC: Self = Self(0x20);
    /// Link register (return address)
    pub const LR: Self = Self(0x21);
    /// Address temporary (assembler scratch)
    pub const AD: Self = Self(0x22);
    /// Arithmetic temporary (assembler scratch)
    pub const AT: Self = Self(0x23);
    /// Stack pointer
    pub const SP: Self = Self(0x24);

    /// Number of registers in the file (r0-r31 plus five specials)
    pub const COUNT: usize = 37;

    /// Highest valid identifier byte
    pub const MAX_ID: u8 = 0x24;

    /// Create a general-purpose register r0-r31.
    pub const fn gpr(index: u8) -> Self {
        debug_assert!(index < 32, "general register index must be 0-31");
        Self(index & 0x1F)
    }

    /// Validate a raw identifier byte.
    pub const fn from_u8(value: u8) -> Option<Self> {
        if value <= Self::MAX_ID {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Get the raw identifier byte.
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Index into the register file (identifier bytes are contiguous).
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Check if this is a general-purpose register.
    pub const fn is_gpr(self) -> bool {
        self.0 <= 0x1F
    }

    /// Check if this is a special register (pc/lr/ad/at/sp).
    pub const fn is_special(self) -> bool {
        self.0 >= 0x20
    }

    /// Parse from assembly name like "r7", "pc", "sp".
    ///
    /// Names are lowercase and case-sensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pc" => return Some(Self::PC),
            "lr" => return Some(Self::LR),
            "ad" => return Some(Self::AD),
            "at" => return Some(Self::AT),
            "sp" => return Some(Self::SP),
            _ => {}
        }

        let index_str = s.strip_prefix('r')?;
        // only canonical spellings: "r07" is not a register name
        if index_str.is_empty() || (index_str.len() > 1 && index_str.starts_with('0')) {
            return None;
        }
        let index: u8 = index_str.parse().ok()?;
        if index < 32 {
            Some(Self(index))
        } else {
            None
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::PC => write!(f, "pc"),
            Self::LR => write!(f, "lr"),
            Self::AD => write!(f, "ad"),
            Self::AT => write!(f, "at"),
            Self::SP => write!(f, "sp"),
            Self(n) => write!(f, "r{}", n),
        }
    }
}
