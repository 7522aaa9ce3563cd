//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、U盘、内存盘等；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 文件系统只通过这层窄接口访问存储，不关心背后是真实磁盘还是一段内存。

#![no_std]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt::Debug;

use spin::Mutex;

/// 设备块大小，字节
pub const BLOCK_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// 访问越过了设备末尾
    OutOfRange,
    /// 缓冲区长度不是块大小的整数倍
    Misaligned,
    /// 底层介质读写失败
    Io,
}

/// 块设备驱动特质
///
/// 一次读写的块数由缓冲区长度决定：`buf.len() / BLOCK_SIZE`。
pub trait BlockDevice: Send + Sync + Any + Debug {
    fn read_blocks(&self, start_block: u64, buf: &mut [u8]) -> Result<(), DeviceError>;
    fn write_blocks(&self, start_block: u64, buf: &[u8]) -> Result<(), DeviceError>;

    /// 设备容量，块数
    fn num_blocks(&self) -> u64;
}

/// 检查一次访问是否落在设备内，并返回其字节区间
pub fn byte_range(
    start_block: u64,
    len: usize,
    num_blocks: u64,
) -> Result<(usize, usize), DeviceError> {
    if len % BLOCK_SIZE != 0 {
        return Err(DeviceError::Misaligned);
    }
    let count = (len / BLOCK_SIZE) as u64;
    let end_block = start_block
        .checked_add(count)
        .ok_or(DeviceError::OutOfRange)?;
    if end_block > num_blocks {
        return Err(DeviceError::OutOfRange);
    }

    let start = start_block as usize * BLOCK_SIZE;
    Ok((start, start + len))
}

/// 内存盘：用一段堆内存充当块设备
#[derive(Debug)]
pub struct RamDisk {
    data: Mutex<Vec<u8>>,
    num_blocks: u64,
}

impl RamDisk {
    pub fn new(num_blocks: u64) -> Self {
        Self {
            data: Mutex::new(vec![0; num_blocks as usize * BLOCK_SIZE]),
            num_blocks,
        }
    }

    /// 以已有的字节作为盘面，不足一块的尾部会被补零
    pub fn from_bytes(mut bytes: Vec<u8>) -> Self {
        let num_blocks = bytes.len().div_ceil(BLOCK_SIZE);
        bytes.resize(num_blocks * BLOCK_SIZE, 0);
        Self {
            data: Mutex::new(bytes),
            num_blocks: num_blocks as u64,
        }
    }

    /// 盘面的完整拷贝
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

impl BlockDevice for RamDisk {
    fn read_blocks(&self, start_block: u64, buf: &mut [u8]) -> Result<(), DeviceError> {
        let (start, end) = byte_range(start_block, buf.len(), self.num_blocks)?;
        buf.copy_from_slice(&self.data.lock()[start..end]);
        Ok(())
    }

    fn write_blocks(&self, start_block: u64, buf: &[u8]) -> Result<(), DeviceError> {
        let (start, end) = byte_range(start_block, buf.len(), self.num_blocks)?;
        self.data.lock()[start..end].copy_from_slice(buf);
        Ok(())
    }

    #[inline]
    fn num_blocks(&self) -> u64 {
        self.num_blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ram_disk() {
        let disk = RamDisk::new(4);
        let block = [0xA5; BLOCK_SIZE];
        disk.write_blocks(3, &block).unwrap();

        let mut buf = [0; 2 * BLOCK_SIZE];
        disk.read_blocks(2, &mut buf).unwrap();
        assert!(buf[..BLOCK_SIZE].iter().all(|&b| b == 0));
        assert_eq!(&buf[BLOCK_SIZE..], &block[..]);

        assert_eq!(Err(DeviceError::OutOfRange), disk.read_blocks(3, &mut buf));
        assert_eq!(Err(DeviceError::Misaligned), disk.write_blocks(0, &[0; 100]));
    }

    #[test]
    fn from_bytes_pads_tail() {
        let disk = RamDisk::from_bytes(vec![1; BLOCK_SIZE + 1]);
        assert_eq!(2, disk.num_blocks());
        assert_eq!(2 * BLOCK_SIZE, disk.to_bytes().len());
    }
}
