//! 索引节点，每个占据索引节点区域的一整块
//!
//! 数据块按逻辑序号依次挂在四级索引上：
//! - 直接：节点内的块编号直接指向**数据块**
//! - 一级：节点内的块编号指向一个一级索引块，其中连续存储指向**数据块**的块编号
//! - 二级：指向的块中存储指向一级索引块的块编号
//! - 三级：指向的块中存储指向二级索引块的块编号
//!
//! 目录的空间用于存放子项的目录项；
//! 文件的空间用于存放它的数据。
//!
//! ## 块索引编码
//!
//! 逻辑序号先减去前几级的总容量，得到本级内的偏移 r；
//! r 除以单个槽位能覆盖的块数得到节点内的槽位，
//! 余数再按 64 进制逐位展开，即为各级索引块内的下标。

use enumflags2::{BitFlags, bitflags};

use super::{get_u32, get_u64, put_u32, put_u64};
use crate::{BLOCK_SIZE, DataBlock};

/// 间接索引块的编号容量
pub const INDIRECT_COUNT: usize = BLOCK_SIZE / 8;

/// 直接索引块可编号数量
const DIRECT_COUNT: usize = 38;
const INDIRECT1_COUNT: usize = 10;
const INDIRECT2_COUNT: usize = 5;
const INDIRECT3_COUNT: usize = 4;

/// 节点内各级索引的槽位数，下标即索引深度
pub const LEVEL_SLOTS: [usize; 4] = [
    DIRECT_COUNT,
    INDIRECT1_COUNT,
    INDIRECT2_COUNT,
    INDIRECT3_COUNT,
];

#[bitflags]
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeFlag {
    Directory = 1 << 0,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskInode {
    pub byte_size: u64,
    /// 已挂上的数据块数，不含索引块
    pub block_count: u64,
    pub permissions: u64,
    pub ctime: u64,
    pub mtime: u64,
    /// 原始标志位，见 [`InodeFlag`]
    pub flags: u64,
    /// 硬链接个数
    pub link_count: u32,
    pub checksum: u32,
    pub direct: [u64; DIRECT_COUNT],
    pub indirect: [u64; INDIRECT1_COUNT],
    pub double_indirect: [u64; INDIRECT2_COUNT],
    pub triple_indirect: [u64; INDIRECT3_COUNT],
}

impl DiskInode {
    pub const SIZE: usize = BLOCK_SIZE;

    const CHECKSUM_OFFSET: usize = 52;
    const SLOTS_OFFSET: usize = 56;

    pub fn new(flags: BitFlags<InodeFlag>) -> Self {
        Self {
            byte_size: 0,
            block_count: 0,
            permissions: 0,
            ctime: 0,
            mtime: 0,
            flags: flags.bits(),
            link_count: 1,
            checksum: 0,
            direct: [0; DIRECT_COUNT],
            indirect: [0; INDIRECT1_COUNT],
            double_indirect: [0; INDIRECT2_COUNT],
            triple_indirect: [0; INDIRECT3_COUNT],
        }
    }

    /// 可识别的标志，未知位被忽略
    #[inline]
    pub fn flags(&self) -> BitFlags<InodeFlag> {
        BitFlags::from_bits_truncate(self.flags)
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.flags().contains(InodeFlag::Directory)
    }

    /// 某一级索引在节点内的槽位
    pub fn slots(&self, level: usize) -> &[u64] {
        match level {
            0 => &self.direct,
            1 => &self.indirect,
            2 => &self.double_indirect,
            _ => &self.triple_indirect,
        }
    }

    pub fn slots_mut(&mut self, level: usize) -> &mut [u64] {
        match level {
            0 => &mut self.direct,
            1 => &mut self.indirect,
            2 => &mut self.double_indirect,
            _ => &mut self.triple_indirect,
        }
    }

    pub fn encode(&self) -> DataBlock {
        let mut block = [0; BLOCK_SIZE];
        put_u64(&mut block, 0, self.byte_size);
        put_u64(&mut block, 8, self.block_count);
        put_u64(&mut block, 16, self.permissions);
        put_u64(&mut block, 24, self.ctime);
        put_u64(&mut block, 32, self.mtime);
        put_u64(&mut block, 40, self.flags);
        put_u32(&mut block, 48, self.link_count);
        put_u32(&mut block, Self::CHECKSUM_OFFSET, self.checksum);

        let slots = (0..LEVEL_SLOTS.len()).flat_map(|level| self.slots(level).iter());
        for (i, &slot) in slots.enumerate() {
            put_u64(&mut block, Self::SLOTS_OFFSET + i * 8, slot);
        }
        block
    }

    pub fn decode(block: &DataBlock) -> Self {
        let mut inode = Self {
            byte_size: get_u64(block, 0),
            block_count: get_u64(block, 8),
            permissions: get_u64(block, 16),
            ctime: get_u64(block, 24),
            mtime: get_u64(block, 32),
            flags: get_u64(block, 40),
            link_count: get_u32(block, 48),
            checksum: get_u32(block, Self::CHECKSUM_OFFSET),
            ..Self::new(BitFlags::empty())
        };

        let mut offset = Self::SLOTS_OFFSET;
        for level in 0..LEVEL_SLOTS.len() {
            for slot in inode.slots_mut(level) {
                *slot = get_u64(block, offset);
                offset += 8;
            }
        }
        inode
    }

    /// 记录中所有小端 u32 字的回绕和，跳过校验和字本身
    pub fn compute_checksum(&self) -> u32 {
        let block = self.encode();
        (0..BLOCK_SIZE)
            .step_by(4)
            .filter(|&offset| offset != Self::CHECKSUM_OFFSET)
            .fold(0u32, |sum, offset| sum.wrapping_add(get_u32(&block, offset)))
    }

    #[inline]
    pub fn verify_checksum(&self) -> bool {
        self.checksum == self.compute_checksum()
    }

    #[inline]
    pub fn update_checksum(&mut self) {
        self.checksum = self.compute_checksum();
    }
}

/// 逻辑块序号在索引树中的位置
///
/// `indices[0]`是节点内的槽位，`indices[1..=level]`依次是各级索引块内的下标。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockIndices {
    level: usize,
    indices: [u64; 4],
}

impl BlockIndices {
    /// 超出四级索引总容量时返回空
    pub fn from_logical(logical: u64) -> Option<Self> {
        let mut rest = logical;
        for (level, &slots) in LEVEL_SLOTS.iter().enumerate() {
            // 单个槽位覆盖的块数
            let span = (INDIRECT_COUNT as u64).pow(level as u32);
            let capacity = slots as u64 * span;
            if rest >= capacity {
                rest -= capacity;
                continue;
            }

            let mut indices = [0; 4];
            indices[0] = rest / span;
            for depth in 1..=level {
                let below = (INDIRECT_COUNT as u64).pow((level - depth) as u32);
                indices[depth] = rest / below % INDIRECT_COUNT as u64;
            }
            return Some(Self { level, indices });
        }

        None
    }

    /// 索引深度：0 为直接索引
    #[inline]
    pub fn level(&self) -> usize {
        self.level
    }

    #[inline]
    pub fn indices(&self) -> &[u64] {
        &self.indices[..=self.level]
    }

    /// 四级索引一共能挂的数据块数
    pub fn capacity() -> u64 {
        LEVEL_SLOTS
            .iter()
            .enumerate()
            .map(|(level, &slots)| slots as u64 * (INDIRECT_COUNT as u64).pow(level as u32))
            .sum()
    }
}
