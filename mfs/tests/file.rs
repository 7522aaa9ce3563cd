use std::sync::Arc;

use block_dev::RamDisk;
use mfs::{BLOCK_SIZE, Error, MosquiFileSystem};

fn formatted(size: u64) -> MosquiFileSystem {
    let mut fs = MosquiFileSystem::init(Arc::new(RamDisk::new(size))).unwrap();
    fs.format("TEST", size).unwrap();
    fs
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

#[test]
fn write_then_read_across_indirect() {
    let mut fs = formatted(1000);
    let root = fs.open_directory("/").unwrap();
    let mut file = fs.create_file("data.bin", &root).unwrap();

    // 跨过直接索引与一级索引的边界
    let data = pattern(40 * BLOCK_SIZE + 100);
    fs.write_file(&mut file, &data).unwrap();
    assert_eq!(data.len() as u64, fs.tell_file(&file));

    let inode = fs.read_inode(file.inode_number()).unwrap();
    assert_eq!(data.len() as u64, inode.byte_size);
    assert_eq!(41, inode.block_count);
    assert!(inode.verify_checksum());

    fs.seek_file(&mut file, 0);
    let mut buf = vec![0; data.len() + 10];
    assert_eq!(data.len(), fs.read_file(&mut file, &mut buf).unwrap());
    assert_eq!(data, buf[..data.len()]);
    assert_eq!(0, fs.read_file(&mut file, &mut buf).unwrap());

    fs.close_file(file).unwrap();
    fs.close_directory(root).unwrap();
}

#[test]
fn chunked_reads() {
    let mut fs = formatted(1000);
    let root = fs.open_directory("/").unwrap();
    let mut file = fs.create_file("f", &root).unwrap();
    let data = pattern(3 * BLOCK_SIZE);
    for chunk in data.chunks(100) {
        fs.write_file(&mut file, chunk).unwrap();
    }
    fs.close_file(file).unwrap();

    let mut file = fs.open_file("/f").unwrap();
    let mut read = Vec::new();
    let mut buf = [0; 333];
    loop {
        let n = fs.read_file(&mut file, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        read.extend_from_slice(&buf[..n]);
    }
    assert_eq!(data, read);
    fs.close_file(file).unwrap();
    fs.close_directory(root).unwrap();
}

#[test]
fn overwrite_in_place() {
    let mut fs = formatted(1000);
    let root = fs.open_directory("/").unwrap();
    let mut file = fs.create_file("f", &root).unwrap();
    fs.write_file(&mut file, &[1; 1000]).unwrap();

    fs.seek_file(&mut file, 500);
    fs.write_file(&mut file, &[2; 20]).unwrap();
    assert_eq!(520, fs.tell_file(&file));

    fs.seek_file(&mut file, 0);
    let mut buf = [0; 1000];
    assert_eq!(1000, fs.read_file(&mut file, &mut buf).unwrap());
    assert!(buf[..500].iter().all(|&b| b == 1));
    assert!(buf[500..520].iter().all(|&b| b == 2));
    assert!(buf[520..].iter().all(|&b| b == 1));
    assert_eq!(1000, fs.read_inode(file.inode_number()).unwrap().byte_size);

    fs.close_file(file).unwrap();
    fs.close_directory(root).unwrap();
}

#[test]
fn holes_read_as_zero() {
    let mut fs = formatted(1000);
    let root = fs.open_directory("/").unwrap();
    let mut file = fs.create_file("sparse", &root).unwrap();

    fs.seek_file(&mut file, 3 * BLOCK_SIZE as u64 + 7);
    fs.write_file(&mut file, b"end").unwrap();

    fs.seek_file(&mut file, 0);
    let mut buf = vec![0xFF; 4 * BLOCK_SIZE];
    let n = fs.read_file(&mut file, &mut buf).unwrap();
    assert_eq!(3 * BLOCK_SIZE + 10, n);
    assert!(buf[..n - 3].iter().all(|&b| b == 0));
    assert_eq!(b"end", &buf[n - 3..n]);

    fs.close_file(file).unwrap();
    fs.close_directory(root).unwrap();
}

#[test]
fn empty_buffers() {
    let mut fs = formatted(1000);
    let root = fs.open_directory("/").unwrap();
    let mut file = fs.create_file("f", &root).unwrap();
    assert_eq!(Err(Error::InputBufferTooSmall), fs.write_file(&mut file, &[]));
    assert_eq!(
        Err(Error::OutputBufferTooSmall),
        fs.read_file(&mut file, &mut [])
    );
    fs.close_file(file).unwrap();
    fs.close_directory(root).unwrap();
}

#[test]
fn kinds_do_not_mix() {
    let mut fs = formatted(1000);
    let root = fs.open_directory("/").unwrap();
    let file = fs.create_file("f", &root).unwrap();

    assert_eq!(Error::InvalidParameters, fs.open_file("/").unwrap_err());
    assert_eq!(Error::InvalidParameters, fs.open_directory("/f").unwrap_err());
    assert_eq!(Err(Error::NotFound), fs.open_file("/g").map(|_| ()));

    fs.close_file(file).unwrap();
    assert_eq!(Err(Error::InvalidParameters), fs.resolve_path("/f/x"));
    fs.close_directory(root).unwrap();
}

#[test]
fn out_of_space() {
    // 20 块的卷有 15 个数据块
    let mut fs = formatted(20);
    assert_eq!(15, fs.layout().num_data_blocks);
    let root = fs.open_directory("/").unwrap();
    let mut file = fs.create_file("big", &root).unwrap();
    // 根目录占去一块
    assert_eq!(1, fs.usage().unwrap().used_blocks);

    fs.write_file(&mut file, &pattern(14 * BLOCK_SIZE)).unwrap();
    assert_eq!(
        Err(Error::OutOfSpace),
        fs.write_file(&mut file, &[1; BLOCK_SIZE])
    );
    // 写到一半失败时，已写入的部分仍然完好
    fs.seek_file(&mut file, 0);
    let mut buf = vec![0; 14 * BLOCK_SIZE];
    fs.read_file(&mut file, &mut buf).unwrap();
    assert_eq!(pattern(14 * BLOCK_SIZE), buf);

    fs.close_file(file).unwrap();
    fs.close_directory(root).unwrap();
}

#[test]
fn far_seek_write_allocates_nothing() {
    let mut fs = formatted(1000);
    let root = fs.open_directory("/").unwrap();
    let mut file = fs.create_file("f", &root).unwrap();
    let before = fs.read_inode(file.inode_number()).unwrap();
    let used = fs.usage().unwrap().used_blocks;

    // 超出单个节点能挂的块数
    fs.seek_file(&mut file, 1 << 40);
    assert_eq!(Err(Error::OutOfSpace), fs.write_file(&mut file, b"x"));
    // 节点挂得下，但卷上的空闲块不够
    fs.seek_file(&mut file, 2000 * BLOCK_SIZE as u64);
    assert_eq!(Err(Error::OutOfSpace), fs.write_file(&mut file, b"x"));

    assert_eq!(used, fs.usage().unwrap().used_blocks);
    assert_eq!(before, fs.read_inode(file.inode_number()).unwrap());

    // 卷没有被耗尽，其他文件照常可写
    let mut other = fs.create_file("g", &root).unwrap();
    fs.write_file(&mut other, &pattern(3 * BLOCK_SIZE)).unwrap();
    assert_eq!(used + 3, fs.usage().unwrap().used_blocks);

    fs.close_file(other).unwrap();
    fs.close_file(file).unwrap();
    fs.close_directory(root).unwrap();
}

#[test]
fn persists_across_mounts() {
    let device = Arc::new(RamDisk::new(1000));
    let mut fs = MosquiFileSystem::init(device.clone()).unwrap();
    fs.format("TEST", 1000).unwrap();
    let root = fs.open_directory("/").unwrap();
    let docs = fs.create_directory("docs", &root).unwrap();
    let mut file = fs.create_file("readme", &docs).unwrap();
    fs.write_file(&mut file, b"hello, mosquito").unwrap();
    fs.close_file(file).unwrap();
    fs.close_directory(docs).unwrap();
    fs.close_directory(root).unwrap();
    fs.unmount();

    // 换一个设备副本重新挂载
    let copy = Arc::new(RamDisk::from_bytes(device.to_bytes()));
    let mut fs = MosquiFileSystem::init(copy).unwrap();
    let mut file = fs.open_file("/docs/readme").unwrap();
    let mut buf = [0; 64];
    let n = fs.read_file(&mut file, &mut buf).unwrap();
    assert_eq!(b"hello, mosquito", &buf[..n]);
    fs.close_file(file).unwrap();
}
