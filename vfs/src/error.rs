use block_dev::DeviceError;
use derive_more::Display;

/// 文件系统操作的错误，平铺且不携带下层原因
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[display(fmt = "Command not implemented")]
    CommandNotImplemented,
    #[display(fmt = "Invalid parameters")]
    InvalidParameters,
    #[display(fmt = "Not found")]
    NotFound,
    #[display(fmt = "Input buffer too small")]
    InputBufferTooSmall,
    #[display(fmt = "Output buffer too small")]
    OutputBufferTooSmall,
    #[display(fmt = "Device error")]
    DeviceError,
    #[display(fmt = "Out of space")]
    OutOfSpace,
    #[display(fmt = "Corrupt filesystem")]
    CorruptFilesystem,
}

pub type Result<T> = core::result::Result<T, Error>;

impl core::error::Error for Error {}

impl From<DeviceError> for Error {
    fn from(err: DeviceError) -> Self {
        match err {
            // 越界与缓冲区不对齐都是调用方给错了参数
            DeviceError::OutOfRange | DeviceError::Misaligned => Self::InvalidParameters,
            DeviceError::Io => Self::DeviceError,
        }
    }
}
