use std::sync::Arc;

use block_dev::{BlockDevice, RamDisk};
use mfs::{BLOCK_SIZE, Error, MosquiFileSystem, ROOT_INODE};

fn formatted(size: u64) -> MosquiFileSystem {
    let mut fs = MosquiFileSystem::init(Arc::new(RamDisk::new(size))).unwrap();
    fs.format("TEST", size).unwrap();
    fs
}

/// 原样改写磁盘上的索引节点，不更新校验和
fn tamper(fs: &MosquiFileSystem, inode_number: u64, f: impl FnOnce(&mut mfs::layout::DiskInode)) {
    let mut inode = fs.read_inode(inode_number).unwrap();
    f(&mut inode);
    fs.write_inode(inode_number, &inode).unwrap();
}

#[test]
fn flipped_checksum_bits() {
    for bit in 0..32 {
        let mut fs = formatted(100);
        let root = fs.open_directory("/").unwrap();
        tamper(&fs, ROOT_INODE, |inode| inode.checksum ^= 1 << bit);

        assert_eq!(
            Error::CorruptFilesystem,
            fs.create_directory("sub", &root).unwrap_err(),
            "bit {bit}"
        );
        assert_eq!(Err(Error::CorruptFilesystem), fs.resolve_path("/sub"));
        // 失败的创建没有分配索引节点
        assert_eq!(1, fs.usage().unwrap().used_inodes);
    }
}

#[test]
fn flipped_data_bits() {
    let tampers: [fn(&mut mfs::layout::DiskInode); 5] = [
        |inode| inode.byte_size ^= 1 << 40,
        |inode| inode.mtime ^= 1,
        |inode| inode.link_count ^= 1 << 31,
        |inode| inode.direct[3] ^= 1 << 17,
        |inode| inode.triple_indirect[3] ^= 1 << 63,
    ];
    for tamper_with in tampers {
        let mut fs = formatted(100);
        tamper(&fs, ROOT_INODE, tamper_with);
        assert_eq!(
            Error::CorruptFilesystem,
            fs.open_directory("/").unwrap_err()
        );
    }
}

#[test]
fn corrupt_file_inode() {
    let mut fs = formatted(1000);
    let root = fs.open_directory("/").unwrap();
    let mut file = fs.create_file("f", &root).unwrap();
    fs.write_file(&mut file, b"payload").unwrap();

    tamper(&fs, file.inode_number(), |inode| inode.byte_size = 1 << 20);
    fs.seek_file(&mut file, 0);
    let mut buf = [0; 16];
    assert_eq!(
        Err(Error::CorruptFilesystem),
        fs.read_file(&mut file, &mut buf)
    );
    assert_eq!(
        Err(Error::CorruptFilesystem),
        fs.write_file(&mut file, b"more")
    );
}

#[test]
fn unaligned_directory_size() {
    let mut fs = formatted(100);
    let root = fs.open_directory("/").unwrap();
    tamper(&fs, ROOT_INODE, |inode| {
        inode.byte_size = 100;
        inode.update_checksum();
    });

    assert_eq!(
        Error::CorruptFilesystem,
        fs.create_directory("sub", &root).unwrap_err()
    );
    assert_eq!(Err(Error::CorruptFilesystem), fs.resolve_path("/x"));
}

#[test]
fn block_pointer_outside_data_region() {
    let mut fs = formatted(100);
    let root = fs.open_directory("/").unwrap();
    let dir = fs.create_directory("a", &root).unwrap();
    fs.close_directory(dir).unwrap();

    // 让根目录的数据块指向元数据块
    tamper(&fs, ROOT_INODE, |inode| {
        inode.direct[0] = 0;
        inode.update_checksum();
    });
    assert_eq!(Err(Error::CorruptFilesystem), fs.resolve_path("/a"));
}

#[test]
fn committed_data_survives_failed_growth() {
    // 20 块的卷有 15 个数据块，根目录占一块
    let mut fs = formatted(20);
    let root = fs.open_directory("/").unwrap();
    let mut file = fs.create_file("f", &root).unwrap();
    let device = fs.block_device().clone();

    fs.write_file(&mut file, &[0xAB; 14 * BLOCK_SIZE]).unwrap();
    let before = fs.read_inode(file.inode_number()).unwrap();
    assert_eq!(
        Err(Error::OutOfSpace),
        fs.write_file(&mut file, &[0xCD; BLOCK_SIZE])
    );
    // 节点未被改动，数据也未被覆盖
    assert_eq!(before, fs.read_inode(file.inode_number()).unwrap());

    let data_start = fs.layout().data_start();
    let mut block = [0; BLOCK_SIZE];
    device.read_blocks(data_start + 1, &mut block).unwrap();
    assert!(block.iter().all(|&b| b == 0xAB));
}
