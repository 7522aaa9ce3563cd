use alloc::string::String;

/// 挂载后卷的概况
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FsInfo {
    /// 设备上是否存在可识别的文件系统
    pub formatted: bool,
    /// 卷大小，块数
    pub size_blocks: u64,
    pub volume_name: String,
}
