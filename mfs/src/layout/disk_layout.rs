use super::Bitmap;
use crate::{BLOCK_BITS, MIN_VOLUME_BLOCKS};

/// 各区域的块范围，全部由元数据块中的两个数量推导而来
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskLayout {
    pub num_data_blocks: u64,
    pub num_inodes: u64,
    pub block_bitmap_blocks: u64,
    pub inode_bitmap_blocks: u64,
}

impl DiskLayout {
    pub fn new(num_data_blocks: u64, num_inodes: u64) -> Self {
        Self {
            num_data_blocks,
            num_inodes,
            block_bitmap_blocks: num_data_blocks.div_ceil(BLOCK_BITS as u64),
            inode_bitmap_blocks: num_inodes.div_ceil(BLOCK_BITS as u64),
        }
    }

    /// 为容量为`size_blocks`的卷规划布局：
    /// 十分之一的块作索引节点，其余扣掉元数据块和两张位图后都作数据块。
    ///
    /// 卷太小时返回空。
    pub fn for_volume(size_blocks: u64) -> Option<Self> {
        if size_blocks < MIN_VOLUME_BLOCKS {
            return None;
        }

        let bits = BLOCK_BITS as u64;
        let num_inodes = size_blocks / 10;
        let inode_bitmap_blocks = num_inodes.div_ceil(bits);
        // 数据块位图的块数先按上界估计，数据块数由此确定
        let remain = size_blocks.checked_sub(num_inodes + inode_bitmap_blocks + 1)?;
        let block_bitmap_estimate = remain.div_ceil(bits);
        let num_data_blocks = remain.checked_sub(block_bitmap_estimate)?;

        (num_data_blocks > 0 && num_inodes > 0).then(|| Self::new(num_data_blocks, num_inodes))
    }

    #[inline]
    pub fn block_bitmap_start(&self) -> u64 {
        1
    }

    #[inline]
    pub fn inode_bitmap_start(&self) -> u64 {
        self.block_bitmap_start() + self.block_bitmap_blocks
    }

    #[inline]
    pub fn inode_table_start(&self) -> u64 {
        self.inode_bitmap_start() + self.inode_bitmap_blocks
    }

    /// 数据块区域的起始块
    #[inline]
    pub fn data_start(&self) -> u64 {
        self.inode_table_start() + self.num_inodes
    }

    /// 布局实际用到的块数
    #[inline]
    pub fn total_blocks(&self) -> u64 {
        self.data_start() + self.num_data_blocks
    }

    #[inline]
    pub fn block_bitmap(&self) -> Bitmap {
        Bitmap::new(self.block_bitmap_start(), self.num_data_blocks)
    }

    #[inline]
    pub fn inode_bitmap(&self) -> Bitmap {
        Bitmap::new(self.inode_bitmap_start(), self.num_inodes)
    }
}
