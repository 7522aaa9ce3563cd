//! # 目录层
//!
//! 目录的数据就是依次排列的 [`DirEntry`] 记录，每块两个；
//! 目录的`byte_size`始终是记录大小的整数倍。
//! 路径一律从根目录出发，以`/`分隔。

use enumflags2::BitFlags;

use crate::layout::{DirEntry, DiskInode, InodeFlag};
use crate::{BLOCK_SIZE, Error, MAX_NAME_LEN, MosquiFileSystem, ROOT_INODE, Result};

/// 打开的目录，持有遍历游标
///
/// NOTE: 句柄不可复制，关闭时被消耗。
#[derive(Debug)]
pub struct Directory {
    inode_number: u64,
    /// 下一个目录项的字节偏移
    cursor: u64,
}

impl Directory {
    #[inline]
    pub fn inode_number(&self) -> u64 {
        self.inode_number
    }
}

const ENTRIES_PER_BLOCK: u64 = (BLOCK_SIZE / DirEntry::SIZE) as u64;

impl MosquiFileSystem {
    /// 在`parent`下创建子目录，并以打开状态返回
    pub fn create_directory(&mut self, name: &str, parent: &Directory) -> Result<Directory> {
        let inode_number =
            self.create_entry(name, parent.inode_number, InodeFlag::Directory.into())?;
        self.open_inode(inode_number);
        Ok(Directory {
            inode_number,
            cursor: 0,
        })
    }

    pub fn open_directory(&mut self, path: &str) -> Result<Directory> {
        let inode_number = self.resolve_path(path)?;
        self.load_dir(inode_number)?;

        self.open_inode(inode_number);
        Ok(Directory {
            inode_number,
            cursor: 0,
        })
    }

    pub fn close_directory(&mut self, directory: Directory) -> Result<()> {
        self.close_inode(directory.inode_number)
    }

    /// 读出游标处的目录项并前移游标；到达末尾时返回空
    pub fn read_next_entry(&self, directory: &mut Directory) -> Result<Option<vfs::DirEntry>> {
        let inode = self.load_dir(directory.inode_number)?;
        if directory.cursor >= inode.byte_size {
            return Ok(None);
        }

        let block = self.read_data(&inode, directory.cursor / BLOCK_SIZE as u64)?;
        let offset = (directory.cursor % BLOCK_SIZE as u64) as usize;
        let entry = DirEntry::decode(&block[offset..offset + DirEntry::SIZE]);
        directory.cursor += DirEntry::SIZE as u64;
        Ok(Some(entry.into()))
    }

    /// 游标回到开头
    #[inline]
    pub fn seek_front(&self, directory: &mut Directory) {
        directory.cursor = 0;
    }

    /// 把绝对路径解析为索引节点号
    ///
    /// 空的路径分量（如结尾的`/`）结束解析。
    pub fn resolve_path(&self, path: &str) -> Result<u64> {
        self.ensure_formatted()?;
        let rest = path.strip_prefix('/').ok_or(Error::InvalidParameters)?;

        let mut inode_number = ROOT_INODE;
        for name in rest.split('/') {
            if name.is_empty() {
                break;
            }
            if name.len() > MAX_NAME_LEN {
                return Err(Error::InvalidParameters);
            }

            let inode = self.load_dir(inode_number)?;
            inode_number = self.find_entry(&inode, name)?.ok_or(Error::NotFound)?;
        }

        log::trace!("{path:?} -> inode {inode_number}");
        Ok(inode_number)
    }

    /// 在目录中按名字查找子项，名字须完全相同
    pub(crate) fn find_entry(&self, dir: &DiskInode, name: &str) -> Result<Option<u64>> {
        let count = dir.byte_size / DirEntry::SIZE as u64;
        for logical in 0..count.div_ceil(ENTRIES_PER_BLOCK) {
            let block = self.read_data(dir, logical)?;
            let in_block = (count - logical * ENTRIES_PER_BLOCK).min(ENTRIES_PER_BLOCK) as usize;

            let found = block
                .chunks_exact(DirEntry::SIZE)
                .take(in_block)
                .map(DirEntry::decode)
                .find(|entry| entry.name_eq(name));
            if let Some(entry) = found {
                return Ok(Some(entry.inode_id()));
            }
        }
        Ok(None)
    }

    /// 新建一个节点并在`parent`目录末尾为它追加目录项，返回新节点号。
    ///
    /// 新节点先落盘再被目录引用。
    pub(crate) fn create_entry(
        &mut self,
        name: &str,
        parent: u64,
        flags: BitFlags<InodeFlag>,
    ) -> Result<u64> {
        // 先校验名字，占位的节点号随后替换
        DirEntry::new(name, 0)?;

        let mut dir = self.load_dir(parent)?;
        if self.find_entry(&dir, name)?.is_some() {
            return Err(Error::InvalidParameters);
        }

        let inode_number = self.new_inode(flags)?;
        let entry = DirEntry::new(name, inode_number)?;

        let logical = dir.byte_size / BLOCK_SIZE as u64;
        let block_id = if logical < dir.block_count {
            self.block_number(&dir, logical)?
        } else {
            // 最后一块已满
            self.add_block(&mut dir, parent)?
        };

        let mut block = [0; BLOCK_SIZE];
        self.block_device().read_blocks(block_id, &mut block)?;
        let offset = (dir.byte_size % BLOCK_SIZE as u64) as usize;
        block[offset..offset + DirEntry::SIZE].copy_from_slice(&entry.encode());
        self.block_device().write_blocks(block_id, &block)?;

        dir.byte_size += DirEntry::SIZE as u64;
        self.store_inode(parent, &mut dir)?;

        log::debug!("created {name:?} as inode {inode_number} under inode {parent}");
        Ok(inode_number)
    }

    /// 读出并校验一个目录节点
    fn load_dir(&self, inode_number: u64) -> Result<DiskInode> {
        let inode = self.load_inode(inode_number)?;
        if !inode.is_dir() {
            return Err(Error::InvalidParameters);
        }
        if inode.byte_size % DirEntry::SIZE as u64 != 0 {
            log::warn!("directory {inode_number} has unaligned size {}", inode.byte_size);
            return Err(Error::CorruptFilesystem);
        }
        Ok(inode)
    }
}
