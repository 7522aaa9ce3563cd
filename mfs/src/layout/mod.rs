//! # 磁盘数据结构层
//!
//! MFS 的磁盘布局：
//! 元数据块 | 数据块位图 | 索引节点位图 | 索引节点区域 | 数据块区域
//!
//! 所有整数都以小端序落盘，编解码显式进行，不依赖宿主的内存表示。

mod super_block;
pub use super_block::SuperBlock;

mod disk_layout;
pub use disk_layout::DiskLayout;

mod bitmap;
pub use bitmap::Bitmap;

mod inode;
pub use inode::{BlockIndices, DiskInode, InodeFlag, INDIRECT_COUNT, LEVEL_SLOTS};

/// 目录项，也属于磁盘文件系统数据结构
mod dir_entry;
pub use dir_entry::DirEntry;

#[inline]
fn get_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

#[inline]
fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn get_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

#[inline]
fn put_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// 以`\0`结尾的定长名字中的有效部分
#[inline]
fn trim_nul(name: &[u8]) -> &[u8] {
    let len = name.iter().position(|&c| c == 0).unwrap_or(name.len());
    &name[..len]
}
