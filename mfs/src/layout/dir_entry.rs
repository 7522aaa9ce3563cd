use alloc::string::String;

use super::{get_u64, put_u64, trim_nul};
use crate::{Error, MAX_NAME_LEN, Result};

/// 名字字段的字节数，最后一字节留给 \0
const NAME_FIELD: usize = MAX_NAME_LEN + 1;

/// 目录中一个子项的元信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    inode_id: u64,
    name: [u8; NAME_FIELD],
}

impl DirEntry {
    /// 目录项大小恒为256字节，一块恰好放两个
    pub const SIZE: usize = 256;

    /// 名字不能为空、不能过长，也不能含有`/`或`\0`
    pub fn new(name: &str, inode_id: u64) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty()
            || bytes.len() > MAX_NAME_LEN
            || bytes.contains(&b'/')
            || bytes.contains(&0)
        {
            return Err(Error::InvalidParameters);
        }

        let mut name = [0; NAME_FIELD];
        name[..bytes.len()].copy_from_slice(bytes);
        Ok(Self { inode_id, name })
    }

    #[inline]
    pub fn inode_id(&self) -> u64 {
        self.inode_id
    }

    #[inline]
    pub fn name_bytes(&self) -> &[u8] {
        trim_nul(&self.name)
    }

    /// 名字完全相同才算匹配
    #[inline]
    pub fn name_eq(&self, name: &str) -> bool {
        self.name_bytes() == name.as_bytes()
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0; Self::SIZE];
        put_u64(&mut bytes, 0, self.inode_id);
        bytes[8..].copy_from_slice(&self.name);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Self {
        let mut name = [0; NAME_FIELD];
        name.copy_from_slice(&bytes[8..Self::SIZE]);
        Self {
            inode_id: get_u64(bytes, 0),
            name,
        }
    }
}

impl From<DirEntry> for vfs::DirEntry {
    fn from(entry: DirEntry) -> Self {
        Self {
            inode: entry.inode_id,
            name: String::from_utf8_lossy(entry.name_bytes()).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn encode_layout() {
        let entry = DirEntry::new("hello", 7).unwrap();
        let bytes = entry.encode();
        assert_eq!(7u64.to_le_bytes(), bytes[..8]);
        assert_eq!(b"hello\0", &bytes[8..14]);
        assert_eq!(entry, DirEntry::decode(&bytes));

        let entry: vfs::DirEntry = entry.into();
        assert_eq!("hello", entry.name);
        assert_eq!(7, entry.inode);
    }

    #[test]
    fn exact_match() {
        let entry = DirEntry::new("abc", 1).unwrap();
        assert!(entry.name_eq("abc"));
        assert!(!entry.name_eq("ab"));
        assert!(!entry.name_eq("abcd"));
    }

    #[test]
    fn name_limits() {
        let longest = "x".repeat(MAX_NAME_LEN);
        let entry = DirEntry::new(&longest, 1).unwrap();
        // 最长的名字之后仍有 \0
        assert_eq!(0, entry.encode()[DirEntry::SIZE - 1]);
        assert_eq!(longest.as_bytes(), entry.name_bytes());

        let too_long = "x".repeat(MAX_NAME_LEN + 1);
        assert_eq!(Err(Error::InvalidParameters), DirEntry::new(&too_long, 1));
        assert_eq!(Err(Error::InvalidParameters), DirEntry::new("", 1));
        assert_eq!(Err(Error::InvalidParameters), DirEntry::new("a/b", 1));
        assert_eq!(Err(Error::InvalidParameters), DirEntry::new(&"a\0b".to_string(), 1));
    }
}
