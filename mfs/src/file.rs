//! # 文件层
//!
//! 普通文件就是没有目录标志的节点，数据按字节连续存放在它的数据块中。

use enumflags2::BitFlags;

use crate::layout::{BlockIndices, DiskInode};
use crate::{BLOCK_SIZE, Directory, Error, MosquiFileSystem, Result};

/// 打开的文件，持有读写位置
///
/// NOTE: 句柄不可复制，关闭时被消耗。
#[derive(Debug)]
pub struct File {
    inode_number: u64,
    position: u64,
}

impl File {
    #[inline]
    pub fn inode_number(&self) -> u64 {
        self.inode_number
    }
}

impl MosquiFileSystem {
    /// 在`parent`下创建空文件，并以打开状态返回
    pub fn create_file(&mut self, name: &str, parent: &Directory) -> Result<File> {
        let inode_number = self.create_entry(name, parent.inode_number(), BitFlags::empty())?;
        self.open_inode(inode_number);
        Ok(File {
            inode_number,
            position: 0,
        })
    }

    pub fn open_file(&mut self, path: &str) -> Result<File> {
        let inode_number = self.resolve_path(path)?;
        self.load_file(inode_number)?;

        self.open_inode(inode_number);
        Ok(File {
            inode_number,
            position: 0,
        })
    }

    pub fn close_file(&mut self, file: File) -> Result<()> {
        self.close_inode(file.inode_number)
    }

    /// 从当前位置读到文件末尾或填满`buf`，返回读到的字节数。
    /// 位置已在末尾时返回 0。
    pub fn read_file(&self, file: &mut File, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Err(Error::OutputBufferTooSmall);
        }

        let inode = self.load_file(file.inode_number)?;
        let start = file.position.min(inode.byte_size);
        let end = (start + buf.len() as u64).min(inode.byte_size);

        let mut offset = start;
        while offset < end {
            let block = self.read_data(&inode, offset / BLOCK_SIZE as u64)?;
            let in_block = (offset % BLOCK_SIZE as u64) as usize;
            let len = (BLOCK_SIZE - in_block).min((end - offset) as usize);

            let dst = (offset - start) as usize;
            buf[dst..dst + len].copy_from_slice(&block[in_block..in_block + len]);
            offset += len as u64;
        }

        file.position = end.max(file.position);
        Ok((end - start) as usize)
    }

    /// 把`buf`写到当前位置，文件按需增长，位置随之后移。
    ///
    /// 位置越过文件末尾时，中间的空洞以零填充。
    pub fn write_file(&mut self, file: &mut File, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            return Err(Error::InputBufferTooSmall);
        }

        let mut inode = self.load_file(file.inode_number)?;
        let start = file.position;
        let end = start
            .checked_add(buf.len() as u64)
            .ok_or(Error::InvalidParameters)?;

        // 空间不够时什么都不分配，以免块被白白挂进文件
        let needed = end.div_ceil(BLOCK_SIZE as u64);
        if needed > BlockIndices::capacity()
            || needed.saturating_sub(inode.block_count) > self.free_blocks()?
        {
            return Err(Error::OutOfSpace);
        }

        // 新块都是清零的
        while inode.block_count < needed {
            self.add_block(&mut inode, file.inode_number)?;
        }

        let mut offset = start;
        while offset < end {
            let logical = offset / BLOCK_SIZE as u64;
            let in_block = (offset % BLOCK_SIZE as u64) as usize;
            let len = (BLOCK_SIZE - in_block).min((end - offset) as usize);
            let src = (offset - start) as usize;

            let mut block = if len == BLOCK_SIZE {
                [0; BLOCK_SIZE]
            } else {
                self.read_data(&inode, logical)?
            };
            block[in_block..in_block + len].copy_from_slice(&buf[src..src + len]);
            self.write_data(&inode, logical, &block)?;
            offset += len as u64;
        }

        if end > inode.byte_size {
            inode.byte_size = end;
            self.store_inode(file.inode_number, &mut inode)?;
        }
        log::trace!(
            "inode {}: wrote {} bytes at {start}",
            file.inode_number,
            buf.len()
        );

        file.position = end;
        Ok(())
    }

    /// 移动读写位置，允许越过文件末尾
    #[inline]
    pub fn seek_file(&self, file: &mut File, position: u64) {
        file.position = position;
    }

    #[inline]
    pub fn tell_file(&self, file: &File) -> u64 {
        file.position
    }

    /// 读出并校验一个普通文件节点
    fn load_file(&self, inode_number: u64) -> Result<DiskInode> {
        let inode = self.load_inode(inode_number)?;
        if inode.is_dir() {
            return Err(Error::InvalidParameters);
        }
        Ok(inode)
    }
}
