//! ROM address-space layout

use std::ops::Range;

/// Address-space layout of a flash ROM
///
/// The ROM is read in `block_size` units and erased in `sector_size` units.
/// `sector_size` is a multiple of `block_size`, and `rom_size` a multiple of
/// `sector_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomGeometry {
    pub rom_size: usize,
    pub block_size: usize,
    pub sector_size: usize,
}

impl RomGeometry {
    pub const fn new(rom_size: usize, block_size: usize, sector_size: usize) -> Self {
        Self {
            rom_size,
            block_size,
            sector_size,
        }
    }

    pub const fn block_count(&self) -> usize {
        self.rom_size / self.block_size
    }

    pub const fn sector_count(&self) -> usize {
        self.rom_size / self.sector_size
    }

    pub const fn blocks_per_sector(&self) -> usize {
        self.sector_size / self.block_size
    }

    /// Byte range covered by sector `index`
    pub fn sector_range(&self, index: usize) -> Range<usize> {
        let start = index * self.sector_size;
        start..start + self.sector_size
    }

    /// Indices of sectors whose bytes differ between two full images
    ///
    /// `None` unless both images are exactly `rom_size` bytes long.
    pub fn changed_sectors(&self, original: &[u8], target: &[u8]) -> Option<Vec<usize>> {
        if original.len() != self.rom_size || target.len() != self.rom_size {
            return None;
        }
        Some(
            (0..self.sector_count())
                .filter(|&i| {
                    let range = self.sector_range(i);
                    original[range.clone()] != target[range]
                })
                .collect(),
        )
    }
}
