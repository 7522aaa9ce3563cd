use block_dev::BlockDevice;

use super::{get_u64, put_u64};
use crate::{BLOCK_BITS, BLOCK_SIZE, DataBlock, Error, Result};

/// 位图区域内块的结构，以小端序 u64 为一组
type BitmapBlock = [u64; BLOCK_BITS / 64];

/// 位图区域，记录其指示区域的块分配情况
///
/// 第 i 位对应被指示区域内的第 i 个对象：
/// 数据块位图的第 i 位就是物理块 `data_start + i`，索引节点位图的第 i 位就是 i 号索引节点。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bitmap {
    /// 位图的起始块
    start_block: u64,
    /// 有效位数，即被指示区域的对象数
    bits: u64,
}

impl Bitmap {
    #[inline]
    pub fn new(start_block: u64, bits: u64) -> Self {
        Self { start_block, bits }
    }

    /// 位图占用块数
    #[inline]
    pub fn blocks(&self) -> u64 {
        self.bits.div_ceil(BLOCK_BITS as u64)
    }

    #[inline]
    pub fn bits(&self) -> u64 {
        self.bits
    }

    /// 分配第一个空闲位，返回其编号。
    /// 若位图的空间用尽，则返回 [`Error::OutOfSpace`]。
    pub fn alloc(&self, block_device: &dyn BlockDevice) -> Result<u64> {
        // 遍历位图区域内所有的块，寻找块内还有剩余空间的bit组(即还有0)
        for block_index in 0..self.blocks() {
            let mut bitmap_block = self.load(block_device, block_index)?;

            let Some((group_index, ingroup_index)) =
                bitmap_block
                    .iter()
                    .enumerate()
                    .find_map(|(group_index, &bits)| {
                        (bits != u64::MAX).then_some((group_index, bits.trailing_ones()))
                    })
            else {
                continue;
            };

            let bit = encode(block_index, group_index, ingroup_index as usize);
            // 最后一块中超出有效位数的部分不可分配
            if bit >= self.bits {
                break;
            }

            // 追加新位
            bitmap_block[group_index] |= 1u64 << ingroup_index;
            self.store(block_device, block_index, &bitmap_block)?;
            return Ok(bit);
        }

        Err(Error::OutOfSpace)
    }

    /// 释放一个已分配的位
    pub fn dealloc(&self, block_device: &dyn BlockDevice, bit: u64) -> Result<()> {
        let (block_index, group_index, ingroup_index) = self.decode(bit)?;
        let mut bitmap_block = self.load(block_device, block_index)?;

        // 编号一定得有对应的位
        let mask = 1u64 << ingroup_index;
        if bitmap_block[group_index] & mask == 0 {
            log::warn!("bit {bit} is already free");
            return Err(Error::CorruptFilesystem);
        }

        bitmap_block[group_index] &= !mask;
        self.store(block_device, block_index, &bitmap_block)
    }

    pub fn is_allocated(&self, block_device: &dyn BlockDevice, bit: u64) -> Result<bool> {
        let (block_index, group_index, ingroup_index) = self.decode(bit)?;
        let bitmap_block = self.load(block_device, block_index)?;
        Ok(bitmap_block[group_index] & (1u64 << ingroup_index) != 0)
    }

    /// 已分配的位数
    pub fn count_allocated(&self, block_device: &dyn BlockDevice) -> Result<u64> {
        let mut count = 0;
        for block_index in 0..self.blocks() {
            let bitmap_block = self.load(block_device, block_index)?;
            count += bitmap_block
                .iter()
                .map(|bits| bits.count_ones() as u64)
                .sum::<u64>();
        }
        Ok(count)
    }

    /// 清零整个位图区域
    pub fn clear(&self, block_device: &dyn BlockDevice) -> Result<()> {
        let zero: DataBlock = [0; BLOCK_SIZE];
        for block_index in 0..self.blocks() {
            block_device.write_blocks(self.start_block + block_index, &zero)?;
        }
        Ok(())
    }

    fn decode(&self, bit: u64) -> Result<(u64, usize, usize)> {
        if bit >= self.bits {
            return Err(Error::InvalidParameters);
        }

        let block_index = bit / BLOCK_BITS as u64;
        let bit = (bit % BLOCK_BITS as u64) as usize;
        Ok((block_index, bit / 64, bit % 64))
    }

    fn load(&self, block_device: &dyn BlockDevice, block_index: u64) -> Result<BitmapBlock> {
        let mut raw: DataBlock = [0; BLOCK_SIZE];
        block_device.read_blocks(self.start_block + block_index, &mut raw)?;

        let mut bitmap_block: BitmapBlock = [0; BLOCK_BITS / 64];
        for (group_index, bits) in bitmap_block.iter_mut().enumerate() {
            *bits = get_u64(&raw, group_index * 8);
        }
        Ok(bitmap_block)
    }

    fn store(
        &self,
        block_device: &dyn BlockDevice,
        block_index: u64,
        bitmap_block: &BitmapBlock,
    ) -> Result<()> {
        let mut raw: DataBlock = [0; BLOCK_SIZE];
        for (group_index, &bits) in bitmap_block.iter().enumerate() {
            put_u64(&mut raw, group_index * 8, bits);
        }
        block_device.write_blocks(self.start_block + block_index, &raw)?;
        Ok(())
    }
}

/// 线性映射编码得到位编号
#[inline]
fn encode(block_index: u64, group_index: usize, ingroup_index: usize) -> u64 {
    block_index * BLOCK_BITS as u64 + (group_index * 64 + ingroup_index) as u64
}
