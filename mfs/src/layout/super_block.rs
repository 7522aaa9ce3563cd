use alloc::string::String;

use super::{get_u64, put_u64, trim_nul};
use crate::{DataBlock, MAGIC};

/// 元数据块（0号块）：
/// - 提供文件系统合法性校验；
/// - 记录推导各区域所需的数量
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    /// 文件系统占据块数
    pub size_blocks: u64,
    pub volume_name: String,
    pub num_data_blocks: u64,
    pub num_inodes: u64,
    pub uuid1: u64,
    pub uuid2: u64,
}

impl SuperBlock {
    /// 卷名字段的字节数
    pub const VOLUME_NAME_SIZE: usize = 256;

    const SIZE_OFFSET: usize = 8;
    const NAME_OFFSET: usize = 16;
    const DATA_BLOCKS_OFFSET: usize = Self::NAME_OFFSET + Self::VOLUME_NAME_SIZE;
    const INODES_OFFSET: usize = Self::DATA_BLOCKS_OFFSET + 8;
    const UUID1_OFFSET: usize = Self::INODES_OFFSET + 8;
    const UUID2_OFFSET: usize = Self::UUID1_OFFSET + 8;

    /// 元数据记录实际占用的字节数，块内其余部分不用
    pub const SIZE: usize = Self::UUID2_OFFSET + 8;

    pub fn encode(&self) -> DataBlock {
        let mut block = [0; crate::BLOCK_SIZE];
        block[..MAGIC.len()].copy_from_slice(MAGIC);
        put_u64(&mut block, Self::SIZE_OFFSET, self.size_blocks);

        // 最后一字节留给 \0
        let name = self.volume_name.as_bytes();
        let len = name.len().min(Self::VOLUME_NAME_SIZE - 1);
        block[Self::NAME_OFFSET..Self::NAME_OFFSET + len].copy_from_slice(&name[..len]);

        put_u64(&mut block, Self::DATA_BLOCKS_OFFSET, self.num_data_blocks);
        put_u64(&mut block, Self::INODES_OFFSET, self.num_inodes);
        put_u64(&mut block, Self::UUID1_OFFSET, self.uuid1);
        put_u64(&mut block, Self::UUID2_OFFSET, self.uuid2);
        block
    }

    /// 魔数不符时返回空，表示设备未格式化
    pub fn decode(block: &DataBlock) -> Option<Self> {
        if !Self::is_valid(block) {
            return None;
        }

        let name = trim_nul(&block[Self::NAME_OFFSET..Self::DATA_BLOCKS_OFFSET]);
        Some(Self {
            size_blocks: get_u64(block, Self::SIZE_OFFSET),
            volume_name: String::from_utf8_lossy(name).into_owned(),
            num_data_blocks: get_u64(block, Self::DATA_BLOCKS_OFFSET),
            num_inodes: get_u64(block, Self::INODES_OFFSET),
            uuid1: get_u64(block, Self::UUID1_OFFSET),
            uuid2: get_u64(block, Self::UUID2_OFFSET),
        })
    }

    #[inline]
    pub fn is_valid(block: &DataBlock) -> bool {
        &block[..MAGIC.len()] == MAGIC
    }
}
