#![no_std]

extern crate alloc;

mod dirent;
mod error;
mod info;

pub use self::{
    dirent::DirEntry,
    error::{Error, Result},
    info::FsInfo,
};

pub use block_dev::BLOCK_SIZE;

/// 目录项名字的最大长度（不含结尾的`\0`）
pub const MAX_NAME_LEN: usize = 247;

/// 卷名的最大长度
pub const MAX_VOLUME_NAME_LEN: usize = 255;
