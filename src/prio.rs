//! Priority bit table and ready-word bit scan
//!
//! Task id is priority: bit 0 is the highest priority, bit 15 the lowest.
//! Picking the next task is "find the lowest set bit", which runs on every
//! scheduling pass. Two interchangeable scans:
//! - intrinsic: `trailing_zeros` (CTZ / RBIT+CLZ on Cortex-M3+)
//! - table: nibble lookup, four steps worst case (Cortex-M0, AVR-class cores)
//!
//! Feature `table-scan` selects the table path for [`highest_priority_ready`].
//!
//! Author: Moroya Sakamoto

use crate::task::TaskId;

/// Bit position (0..16) to 16-bit mask
pub const BITPOS_TO_BIT: [u16; 16] = [
    0x0001, 0x0002, 0x0004, 0x0008, 0x0010, 0x0020, 0x0040, 0x0080,
    0x0100, 0x0200, 0x0400, 0x0800, 0x1000, 0x2000, 0x4000, 0x8000,
];

/// Lowest set bit position of a nibble (entry 0 is unused)
const NIBBLE_LSB: [u8; 16] = [0, 0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0, 2, 0, 1, 0];

/// Mask with only bit `pos` set
///
/// Positions wrap at 16; callers validate ids before they get here.
#[inline(always)]
pub const fn bit(pos: u8) -> u16 {
    BITPOS_TO_BIT[(pos & 0x0F) as usize]
}

/// Lowest set bit via the `trailing_zeros` intrinsic
#[inline]
pub const fn scan_intrinsic(mask: u16) -> Option<TaskId> {
    if mask == 0 {
        None
    } else {
        Some(TaskId(mask.trailing_zeros() as u8))
    }
}

/// Lowest set bit via the nibble table
#[inline]
pub const fn scan_table(mask: u16) -> Option<TaskId> {
    let mut shift = 0u8;
    while shift < 16 {
        let nibble = (mask >> shift) & 0x0F;
        if nibble != 0 {
            return Some(TaskId(shift + NIBBLE_LSB[nibble as usize]));
        }
        shift += 4;
    }
    None
}

/// Highest-priority (smallest id) task whose bit is set, `None` for an empty word
#[cfg(not(feature = "table-scan"))]
#[inline]
pub const fn highest_priority_ready(mask: u16) -> Option<TaskId> {
    scan_intrinsic(mask)
}

/// Highest-priority (smallest id) task whose bit is set, `None` for an empty word
#[cfg(feature = "table-scan")]
#[inline]
pub const fn highest_priority_ready(mask: u16) -> Option<TaskId> {
    scan_table(mask)
}
