mod cli;

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;

use block_dev::{BLOCK_SIZE, BlockDevice};
use clap::Parser;
use cli::Cli;
use mfs::{Directory, MosquiFileSystem};
use mfs_fuse::BlockFile;
use typed_bytesize::ByteSizeIec;

fn fs_error(err: mfs::Error) -> io::Error {
    io::Error::other(err)
}

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    println!("image={:?}\nsource={:?}", cli.image, cli.source);

    let disk_size = ByteSizeIec::mib(cli.size_mib).0;
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&cli.image)?;
    fd.set_len(disk_size)?;

    let block_dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd)?);
    let size_blocks = block_dev.num_blocks();
    let mut fs = MosquiFileSystem::init(block_dev).map_err(fs_error)?;
    fs.format(&cli.name, size_blocks).map_err(fs_error)?;

    let root = fs.open_directory("/").map_err(fs_error)?;
    if let Some(source) = &cli.source {
        pack_dir(&mut fs, source, &root)?;
    }

    let info = fs.info();
    let usage = fs.usage().map_err(fs_error)?;
    println!(
        "volume {:?}: {} blocks of {BLOCK_SIZE} bytes",
        info.volume_name, info.size_blocks
    );
    println!(
        "data blocks {}/{}, inodes {}/{}",
        usage.used_blocks, usage.total_blocks, usage.used_inodes, usage.total_inodes
    );
    fs.close_directory(root).map_err(fs_error)?;
    print_tree(&mut fs, "/", 0)?;

    fs.unmount();
    Ok(())
}

/// 把宿主目录`dir`下的内容递归复制到`parent`中
fn pack_dir(fs: &mut MosquiFileSystem, dir: &Path, parent: &Directory) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            log::warn!("skipping non UTF-8 name {name:?}");
            continue;
        };

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            log::info!("dir={name:?}");
            let child = fs.create_directory(name, parent).map_err(fs_error)?;
            pack_dir(fs, &entry.path(), &child)?;
            fs.close_directory(child).map_err(fs_error)?;
        } else if file_type.is_file() {
            let data = fs::read(entry.path())?;
            log::info!("file={name:?} len={}", data.len());
            let mut file = fs.create_file(name, parent).map_err(fs_error)?;
            if !data.is_empty() {
                fs.write_file(&mut file, &data).map_err(fs_error)?;
            }
            fs.close_file(file).map_err(fs_error)?;
        } else {
            log::warn!("skipping {name:?}: neither a file nor a directory");
        }
    }

    Ok(())
}

fn print_tree(fs: &mut MosquiFileSystem, path: &str, depth: usize) -> io::Result<()> {
    let mut dir = fs.open_directory(path).map_err(fs_error)?;
    let mut children = Vec::new();
    while let Some(entry) = fs.read_next_entry(&mut dir).map_err(fs_error)? {
        children.push(entry);
    }
    fs.close_directory(dir).map_err(fs_error)?;

    for child in children {
        let child_path = format!("{path}{}/", child.name);
        let inode = fs.read_inode(child.inode).map_err(fs_error)?;
        if inode.is_dir() {
            println!("{:indent$}{}/", "", child.name, indent = depth * 2);
            print_tree(fs, &child_path, depth + 1)?;
        } else {
            println!(
                "{:indent$}{} ({} bytes)",
                "",
                child.name,
                inode.byte_size,
                indent = depth * 2
            );
        }
    }

    Ok(())
}
