#![no_std]

extern crate alloc;

/* mfs 的整体架构，自上而下 */

// 文件层：普通文件的创建、打开与按位置读写
mod file;

// 目录层：路径解析、目录创建与遍历
mod directory;

// 磁盘块管理器层：挂载、格式化、索引节点存取、块分配与多级索引
mod efs;

// 磁盘数据结构层：表示磁盘文件系统的数据结构
pub mod layout;

pub use self::{
    directory::Directory,
    efs::{MosquiFileSystem, Usage},
    file::File,
};

pub use block_dev::{BlockDevice, DeviceError};
pub use vfs::{BLOCK_SIZE, DirEntry, Error, FsInfo, MAX_NAME_LEN, MAX_VOLUME_NAME_LEN, Result};

/// 元数据块开头的魔数
pub const MAGIC: &[u8; 8] = b"MOSQUIFS";
/// 一个位图块能表示的位数
pub const BLOCK_BITS: usize = BLOCK_SIZE * 8;
/// 根目录的索引节点号
pub const ROOT_INODE: u64 = 0;
/// 可格式化的最小卷，块数
pub const MIN_VOLUME_BLOCKS: u64 = 10;

type DataBlock = [u8; BLOCK_SIZE];
