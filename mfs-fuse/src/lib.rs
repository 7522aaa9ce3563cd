//! 宿主侧工具：把镜像文件当作块设备，供打包器与测试使用。


mod block_file;

pub use self::block_file::BlockFile;
