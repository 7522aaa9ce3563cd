//! # 磁盘块管理器层
//!
//! 构建出磁盘的布局并使用：挂载与格式化、索引节点的存取、
//! 块与索引节点的分配，以及把逻辑块序号经多级索引解析为物理块号。
//!
//! 引擎是同步且直写的，没有任何内部锁；
//! 多线程使用时，调用方须在每个公开操作期间持有外部互斥锁。

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;

use block_dev::BlockDevice;
use enumflags2::BitFlags;

use crate::layout::{BlockIndices, DiskInode, DiskLayout, INDIRECT_COUNT, InodeFlag, SuperBlock};
use crate::{BLOCK_SIZE, DataBlock, Error, FsInfo, MAX_VOLUME_NAME_LEN, ROOT_INODE, Result};

/// 间接索引块
type IndirectBlock = [u64; INDIRECT_COUNT];

/// 已挂载的 MFS 卷
#[derive(Debug)]
pub struct MosquiFileSystem {
    block_device: Arc<dyn BlockDevice>,
    formatted: bool,
    size_blocks: u64,
    volume_name: String,
    layout: DiskLayout,
    uuid: (u64, u64),
    /// 已打开的索引节点 -> 打开次数
    open_inodes: BTreeMap<u64, usize>,
}

/// 卷的占用情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub used_blocks: u64,
    pub total_blocks: u64,
    pub used_inodes: u64,
    pub total_inodes: u64,
}

impl MosquiFileSystem {
    /// 挂载设备。
    ///
    /// 0号块没有魔数时得到一个未格式化的卷，这不算错误。
    pub fn init(block_device: Arc<dyn BlockDevice>) -> Result<Self> {
        let mut fs = Self {
            block_device,
            formatted: false,
            size_blocks: 0,
            volume_name: String::new(),
            layout: DiskLayout::new(0, 0),
            uuid: (0, 0),
            open_inodes: BTreeMap::new(),
        };

        let mut block = [0; BLOCK_SIZE];
        fs.block_device.read_blocks(0, &mut block)?;
        let Some(super_block) = SuperBlock::decode(&block) else {
            log::debug!("no MFS signature, volume is unformatted");
            return Ok(fs);
        };

        // 各区域都不可能比整个卷大，先约束住再推导布局，以免越界的计数溢出
        let size_blocks = super_block.size_blocks;
        if size_blocks > fs.block_device.num_blocks()
            || super_block.num_data_blocks > size_blocks
            || super_block.num_inodes > size_blocks
        {
            log::warn!(
                "volume of {size_blocks} blocks with {} data blocks and {} inodes does not fit device",
                super_block.num_data_blocks,
                super_block.num_inodes
            );
            return Err(Error::CorruptFilesystem);
        }

        let layout = DiskLayout::new(super_block.num_data_blocks, super_block.num_inodes);
        if layout.total_blocks() > size_blocks {
            log::warn!(
                "layout of {} blocks does not fit volume of {size_blocks} blocks",
                layout.total_blocks()
            );
            return Err(Error::CorruptFilesystem);
        }

        fs.formatted = true;
        fs.size_blocks = super_block.size_blocks;
        fs.volume_name = super_block.volume_name;
        fs.layout = layout;
        fs.uuid = (super_block.uuid1, super_block.uuid2);
        log::debug!(
            "mounted {:?}: {} blocks, {} inodes, data at {}",
            fs.volume_name,
            fs.size_blocks,
            layout.num_inodes,
            layout.data_start()
        );
        Ok(fs)
    }

    /// 在设备的前`size_blocks`块上建立新卷，原有内容全部作废
    pub fn format(&mut self, volume_name: &str, size_blocks: u64) -> Result<()> {
        if volume_name.len() > MAX_VOLUME_NAME_LEN || size_blocks > self.block_device.num_blocks() {
            return Err(Error::InvalidParameters);
        }
        let layout = DiskLayout::for_volume(size_blocks).ok_or(Error::InvalidParameters)?;

        let super_block = SuperBlock {
            size_blocks,
            volume_name: volume_name.into(),
            num_data_blocks: layout.num_data_blocks,
            num_inodes: layout.num_inodes,
            uuid1: 0,
            uuid2: 0,
        };
        self.block_device.write_blocks(0, &super_block.encode())?;
        layout.block_bitmap().clear(self.block_device.as_ref())?;
        layout.inode_bitmap().clear(self.block_device.as_ref())?;

        self.formatted = true;
        self.size_blocks = size_blocks;
        self.volume_name = super_block.volume_name;
        self.layout = layout;
        self.uuid = (0, 0);
        self.open_inodes.clear();

        // 根目录必然拿到第一个索引节点
        let root = self.alloc_inode()?;
        if root != ROOT_INODE {
            return Err(Error::CorruptFilesystem);
        }
        self.store_inode(root, &mut DiskInode::new(InodeFlag::Directory.into()))?;

        log::debug!(
            "formatted {:?}: {} blocks, {} inodes, {} data blocks from {}",
            self.volume_name,
            size_blocks,
            layout.num_inodes,
            layout.num_data_blocks,
            layout.data_start()
        );
        Ok(())
    }

    #[inline]
    pub fn info(&self) -> FsInfo {
        FsInfo {
            formatted: self.formatted,
            size_blocks: self.size_blocks,
            volume_name: self.volume_name.clone(),
        }
    }

    pub fn usage(&self) -> Result<Usage> {
        self.ensure_formatted()?;
        let device = self.block_device.as_ref();
        let (block_bitmap, inode_bitmap) = (self.layout.block_bitmap(), self.layout.inode_bitmap());
        Ok(Usage {
            used_blocks: block_bitmap.count_allocated(device)?,
            total_blocks: block_bitmap.bits(),
            used_inodes: inode_bitmap.count_allocated(device)?,
            total_inodes: inode_bitmap.bits(),
        })
    }

    /// 剩余可分配的数据块数
    pub(crate) fn free_blocks(&self) -> Result<u64> {
        let usage = self.usage()?;
        Ok(usage.total_blocks - usage.used_blocks)
    }

    #[inline]
    pub fn uuid(&self) -> (u64, u64) {
        self.uuid
    }

    #[inline]
    pub fn layout(&self) -> &DiskLayout {
        &self.layout
    }

    #[inline]
    pub fn block_device(&self) -> &Arc<dyn BlockDevice> {
        &self.block_device
    }

    /// 卸载并交还设备。
    /// 直写的引擎无需刷盘；仍未关闭的索引节点只会被记录下来。
    pub fn unmount(self) -> Arc<dyn BlockDevice> {
        if !self.open_inodes.is_empty() {
            log::warn!(
                "unmounting {:?} with open inodes: {:?}",
                self.volume_name,
                self.open_inodes
            );
        }
        self.block_device
    }

    pub(crate) fn ensure_formatted(&self) -> Result<()> {
        if self.formatted {
            Ok(())
        } else {
            Err(Error::InvalidParameters)
        }
    }
}

/* 索引节点存取 */

impl MosquiFileSystem {
    /// 原样读出`inode_number`号索引节点，不做校验
    pub fn read_inode(&self, inode_number: u64) -> Result<DiskInode> {
        let block_id = self.inode_block(inode_number)?;
        let mut block = [0; BLOCK_SIZE];
        self.block_device.read_blocks(block_id, &mut block)?;
        Ok(DiskInode::decode(&block))
    }

    /// 原样写入索引节点，校验和由调用方负责
    pub fn write_inode(&self, inode_number: u64, inode: &DiskInode) -> Result<()> {
        let block_id = self.inode_block(inode_number)?;
        self.block_device.write_blocks(block_id, &inode.encode())?;
        Ok(())
    }

    /// 读出并校验索引节点
    pub(crate) fn load_inode(&self, inode_number: u64) -> Result<DiskInode> {
        let inode = self.read_inode(inode_number)?;
        if !inode.verify_checksum() {
            log::warn!(
                "inode {inode_number}: checksum {:#x}, expected {:#x}",
                inode.checksum,
                inode.compute_checksum()
            );
            return Err(Error::CorruptFilesystem);
        }
        Ok(inode)
    }

    /// 重算校验和后写入
    pub(crate) fn store_inode(&self, inode_number: u64, inode: &mut DiskInode) -> Result<()> {
        inode.update_checksum();
        self.write_inode(inode_number, inode)
    }

    fn inode_block(&self, inode_number: u64) -> Result<u64> {
        self.ensure_formatted()?;
        if inode_number >= self.layout.num_inodes {
            return Err(Error::InvalidParameters);
        }
        Ok(self.layout.inode_table_start() + inode_number)
    }
}

/* 分配 */

impl MosquiFileSystem {
    /// 在磁盘上分配新的 inode 并返回其编号
    pub fn alloc_inode(&mut self) -> Result<u64> {
        self.ensure_formatted()?;
        let inode_number = self.layout.inode_bitmap().alloc(self.block_device.as_ref())?;
        log::trace!("alloc inode {inode_number}");
        Ok(inode_number)
    }

    /// 在磁盘上分配新的数据块并返回其**物理**块号
    pub fn alloc_block(&mut self) -> Result<u64> {
        self.ensure_formatted()?;
        let bit = self.layout.block_bitmap().alloc(self.block_device.as_ref())?;
        let block_id = self.layout.data_start() + bit;
        log::trace!("alloc block {block_id}");
        Ok(block_id)
    }

    /// 分配一个全零的块
    fn alloc_zeroed(&mut self) -> Result<u64> {
        let block_id = self.alloc_block()?;
        self.block_device.write_blocks(block_id, &[0; BLOCK_SIZE])?;
        Ok(block_id)
    }

    /// 索引中记录的块号必须落在数据区内，否则视为损坏
    fn check_data_block(&self, block_id: u64) -> Result<u64> {
        if block_id < self.layout.data_start() || block_id >= self.layout.total_blocks() {
            log::warn!("block number {block_id} is outside the data region");
            return Err(Error::CorruptFilesystem);
        }
        Ok(block_id)
    }

    fn read_table(&self, block_id: u64) -> Result<IndirectBlock> {
        let mut raw = [0; BLOCK_SIZE];
        self.block_device.read_blocks(self.check_data_block(block_id)?, &mut raw)?;

        let mut table = [0; INDIRECT_COUNT];
        for (slot, bytes) in table.iter_mut().zip(raw.chunks_exact(8)) {
            let mut word = [0; 8];
            word.copy_from_slice(bytes);
            *slot = u64::from_le_bytes(word);
        }
        Ok(table)
    }

    fn write_table(&self, block_id: u64, table: &IndirectBlock) -> Result<()> {
        let mut raw = [0; BLOCK_SIZE];
        for (bytes, slot) in raw.chunks_exact_mut(8).zip(table) {
            bytes.copy_from_slice(&slot.to_le_bytes());
        }
        self.block_device.write_blocks(block_id, &raw)?;
        Ok(())
    }
}

/* 多级索引 */

impl MosquiFileSystem {
    /// 逐级查表，得到逻辑块对应的物理块号
    pub fn resolve_block(&self, inode: &DiskInode, indices: &BlockIndices) -> Result<u64> {
        let path = indices.indices();
        let mut block_id = inode.slots(indices.level())[path[0] as usize];
        for &index in &path[1..] {
            let table = self.read_table(block_id)?;
            block_id = table[index as usize];
        }
        self.check_data_block(block_id)
    }

    /// 节点中第`logical`个数据块的物理块号
    pub fn block_number(&self, inode: &DiskInode, logical: u64) -> Result<u64> {
        if logical >= inode.block_count {
            return Err(Error::InvalidParameters);
        }
        let indices = BlockIndices::from_logical(logical).ok_or(Error::InvalidParameters)?;
        self.resolve_block(inode, &indices)
    }

    /// 把`new_block`挂到`indices`所指的位置，途中缺失的索引块按需分配。
    ///
    /// 新索引块先以全零写盘再被上一级引用，叶子最后写入；
    /// 节点本身只在内存中修改，由调用方持久化。
    pub fn extend(
        &mut self,
        inode: &mut DiskInode,
        indices: &BlockIndices,
        new_block: u64,
    ) -> Result<()> {
        let level = indices.level();
        let indices = indices.indices();
        let slot = &mut inode.slots_mut(level)[indices[0] as usize];
        if level == 0 {
            *slot = new_block;
            return Ok(());
        }

        if *slot == 0 {
            *slot = self.alloc_zeroed()?;
            log::trace!("level {level} table at {}", *slot);
        }
        let mut table_block = *slot;

        for &index in &indices[1..level] {
            let mut table = self.read_table(table_block)?;
            if table[index as usize] == 0 {
                table[index as usize] = self.alloc_zeroed()?;
                self.write_table(table_block, &table)?;
                log::trace!("table at {} under {table_block}", table[index as usize]);
            }
            table_block = table[index as usize];
        }

        let mut table = self.read_table(table_block)?;
        table[indices[level] as usize] = new_block;
        self.write_table(table_block, &table)
    }

    /// 为节点追加一个清零的数据块，并持久化节点。
    ///
    /// 中途失败不回滚，已分配的块会泄漏。
    pub fn add_block(&mut self, inode: &mut DiskInode, inode_number: u64) -> Result<u64> {
        // 节点已挂满
        let indices = BlockIndices::from_logical(inode.block_count).ok_or(Error::OutOfSpace)?;
        let block_id = self.alloc_zeroed()?;
        self.extend(inode, &indices, block_id)?;
        inode.block_count += 1;
        self.store_inode(inode_number, inode)?;
        log::trace!(
            "inode {inode_number}: logical {} -> block {block_id}",
            inode.block_count - 1
        );
        Ok(block_id)
    }

    pub(crate) fn read_data(&self, inode: &DiskInode, logical: u64) -> Result<DataBlock> {
        let block_id = self.block_number(inode, logical)?;
        let mut block = [0; BLOCK_SIZE];
        self.block_device.read_blocks(block_id, &mut block)?;
        Ok(block)
    }

    pub(crate) fn write_data(&self, inode: &DiskInode, logical: u64, block: &DataBlock) -> Result<()> {
        let block_id = self.block_number(inode, logical)?;
        self.block_device.write_blocks(block_id, block)?;
        Ok(())
    }
}

/* 打开表 */

impl MosquiFileSystem {
    pub(crate) fn open_inode(&mut self, inode_number: u64) {
        *self.open_inodes.entry(inode_number).or_default() += 1;
    }

    pub(crate) fn close_inode(&mut self, inode_number: u64) -> Result<()> {
        let count = self
            .open_inodes
            .get_mut(&inode_number)
            .ok_or(Error::InvalidParameters)?;
        *count -= 1;
        if *count == 0 {
            self.open_inodes.remove(&inode_number);
        }
        Ok(())
    }

    #[inline]
    pub fn is_open(&self, inode_number: u64) -> bool {
        self.open_inodes.contains_key(&inode_number)
    }

    /// 新建一个具有给定标志的空节点
    pub(crate) fn new_inode(&mut self, flags: BitFlags<InodeFlag>) -> Result<u64> {
        let inode_number = self.alloc_inode()?;
        self.store_inode(inode_number, &mut DiskInode::new(flags))?;
        Ok(inode_number)
    }
}
