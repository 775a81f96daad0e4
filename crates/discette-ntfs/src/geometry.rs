//! Volume geometry needed to address index blocks

use serde::{Deserialize, Serialize};

/// Addressing unit used when an index block is smaller than a cluster
pub const SMALL_BLOCK_UNIT: u64 = 512;

/// The bits of the volume's boot sector that index addressing depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeGeometry {
    /// Bytes per sector, also the stride of update sequence fixups
    pub bytes_per_sector: u16,
    /// Bytes per cluster
    pub bytes_per_cluster: u32,
}

impl Default for VolumeGeometry {
    fn default() -> Self {
        Self {
            bytes_per_sector: 512,
            bytes_per_cluster: 4096,
        }
    }
}

impl VolumeGeometry {
    /// Create geometry from sector and cluster sizes
    pub const fn new(bytes_per_sector: u16, bytes_per_cluster: u32) -> Self {
        Self {
            bytes_per_sector,
            bytes_per_cluster,
        }
    }

    /// Size of one VCN step in the allocation stream
    ///
    /// Index blocks smaller than a cluster are addressed in 512-byte units.
    pub const fn block_unit(&self, index_buffer_size: u32) -> u64 {
        if index_buffer_size >= self.bytes_per_cluster {
            self.bytes_per_cluster as u64
        } else {
            SMALL_BLOCK_UNIT
        }
    }

    /// Byte offset of the block at `vcn`, `None` on overflow
    pub const fn vcn_offset(&self, vcn: u64, index_buffer_size: u32) -> Option<u64> {
        vcn.checked_mul(self.block_unit(index_buffer_size))
    }

    /// Number of VCNs one index block spans
    pub fn vcns_per_block(&self, index_buffer_size: u32) -> u64 {
        (u64::from(index_buffer_size) / self.block_unit(index_buffer_size)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_addressing() {
        let geometry = VolumeGeometry::new(512, 4096);
        assert_eq!(geometry.block_unit(4096), 4096);
        assert_eq!(geometry.vcn_offset(3, 4096), Some(3 * 4096));
        assert_eq!(geometry.vcns_per_block(4096), 1);
    }

    #[test]
    fn test_large_blocks_span_clusters() {
        let geometry = VolumeGeometry::new(512, 1024);
        assert_eq!(geometry.block_unit(4096), 1024);
        assert_eq!(geometry.vcns_per_block(4096), 4);
        assert_eq!(geometry.vcn_offset(4, 4096), Some(4096));
    }

    #[test]
    fn test_small_blocks_use_sector_units() {
        let geometry = VolumeGeometry::new(512, 65536);
        assert_eq!(geometry.block_unit(4096), SMALL_BLOCK_UNIT);
        assert_eq!(geometry.vcns_per_block(4096), 8);
        assert_eq!(geometry.vcn_offset(8, 4096), Some(4096));
    }

    #[test]
    fn test_offset_overflow() {
        let geometry = VolumeGeometry::default();
        assert_eq!(geometry.vcn_offset(u64::MAX, 4096), None);
    }
}
