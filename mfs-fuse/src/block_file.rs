use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use block_dev::{BLOCK_SIZE, BlockDevice, DeviceError, byte_range};
use send_wrapper::SendWrapper;

/// 以宿主上的镜像文件充当块设备，容量取自打开时的文件长度
#[derive(Debug)]
pub struct BlockFile {
    inner: SendWrapper<RefCell<File>>,
    num_blocks: u64,
}

impl BlockFile {
    pub fn new(fd: File) -> io::Result<Self> {
        let num_blocks = fd.metadata()?.len() / BLOCK_SIZE as u64;
        Ok(Self {
            inner: SendWrapper::new(RefCell::new(fd)),
            num_blocks,
        })
    }
}

fn io_error(err: io::Error) -> DeviceError {
    log::error!("image I/O failed: {err}");
    DeviceError::Io
}

impl BlockDevice for BlockFile {
    fn read_blocks(&self, start_block: u64, buf: &mut [u8]) -> Result<(), DeviceError> {
        let (start, _) = byte_range(start_block, buf.len(), self.num_blocks)?;
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start(start as u64)).map_err(io_error)?;
        file.read_exact(buf).map_err(io_error)
    }

    fn write_blocks(&self, start_block: u64, buf: &[u8]) -> Result<(), DeviceError> {
        let (start, _) = byte_range(start_block, buf.len(), self.num_blocks)?;
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start(start as u64)).map_err(io_error)?;
        file.write_all(buf).map_err(io_error)
    }

    #[inline]
    fn num_blocks(&self) -> u64 {
        self.num_blocks
    }
}
