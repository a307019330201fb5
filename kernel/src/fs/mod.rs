//! Read-only file system.
//!
//! The on-disk image (handed over by the boot loader as a multiboot module)
//! is never modified: a boot block holding up to 63 directory entries,
//! followed by the inode blocks, followed by the data blocks, all 4 KiB.
//!
//! Layout:
//! - boot block: 64-byte header (little-endian counts of dentries, inodes
//!   and data blocks, 52 reserved bytes), then 63 × 64-byte dentries
//!   (32-byte zero-padded name, 4-byte type, 4-byte inode, 24 reserved).
//! - inode block: 4-byte file length, then up to 1023 data-block indices.
//! - data blocks: raw file contents.

use crate::error::{KernelError, KernelResult};
use crate::process;

pub const BLOCK_SIZE: usize = 4096;
pub const NAME_LEN: usize = 32;
pub const MAX_DENTRIES: usize = 63;

const HEADER_SIZE: usize = 64;
const DENTRY_SIZE: usize = 64;

/// File types carried in a dentry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Type 0: the periodic clock device.
    Clock,
    /// Type 1: the directory.
    Directory,
    /// Type 2: regular file.
    Regular,
}

impl FileType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(FileType::Clock),
            1 => Some(FileType::Directory),
            2 => Some(FileType::Regular),
            _ => None,
        }
    }
}

/// A directory entry, copied out of the boot block.
#[derive(Debug, Clone, Copy)]
pub struct Dentry {
    pub name: [u8; NAME_LEN],
    pub ftype: u32,
    pub inode: u32,
}

impl Dentry {
    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_raw(self.ftype)
    }

    /// Name with the zero padding trimmed.
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_LEN);
        &self.name[..end]
    }
}

/// A parsed view over a file-system image.
pub struct FsImage<'a> {
    image: &'a [u8],
}

impl<'a> FsImage<'a> {
    pub fn new(image: &'a [u8]) -> KernelResult<Self> {
        if image.len() < BLOCK_SIZE {
            return Err(KernelError::InvalidArgument {
                name: "file system image",
            });
        }
        let fs = Self { image };
        if fs.dentry_count() > MAX_DENTRIES {
            return Err(KernelError::InvalidArgument {
                name: "file system image",
            });
        }
        // The inode and data regions must fit inside the image. Widened
        // math so hostile counts cannot overflow the check itself.
        let expected =
            (BLOCK_SIZE as u64) * (1 + fs.inode_count() as u64 + fs.data_block_count() as u64);
        if (image.len() as u64) < expected {
            return Err(KernelError::InvalidArgument {
                name: "file system image",
            });
        }
        Ok(fs)
    }

    fn u32_at(&self, offset: usize) -> u32 {
        let bytes: [u8; 4] = self.image[offset..offset + 4]
            .try_into()
            .unwrap_or([0; 4]);
        u32::from_le_bytes(bytes)
    }

    pub fn dentry_count(&self) -> usize {
        self.u32_at(0) as usize
    }

    pub fn inode_count(&self) -> usize {
        self.u32_at(4) as usize
    }

    pub fn data_block_count(&self) -> usize {
        self.u32_at(8) as usize
    }

    /// Dentry lookup by directory index.
    pub fn dentry_by_index(&self, index: usize) -> Option<Dentry> {
        if index >= self.dentry_count() || index >= MAX_DENTRIES {
            return None;
        }
        let base = HEADER_SIZE + index * DENTRY_SIZE;
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&self.image[base..base + NAME_LEN]);
        Some(Dentry {
            name,
            ftype: self.u32_at(base + NAME_LEN),
            inode: self.u32_at(base + NAME_LEN + 4),
        })
    }

    /// Dentry lookup by name. Names longer than 32 bytes match nothing;
    /// comparison is against the zero-padded name field.
    pub fn dentry_by_name(&self, name: &[u8]) -> Option<Dentry> {
        if name.is_empty() || name.len() > NAME_LEN {
            return None;
        }
        (0..self.dentry_count())
            .filter_map(|i| self.dentry_by_index(i))
            .find(|d| d.name_bytes() == name)
    }

    /// Length in bytes of the file behind `inode`.
    pub fn file_size(&self, inode: usize) -> Option<usize> {
        if inode >= self.inode_count() {
            return None;
        }
        Some(self.u32_at(BLOCK_SIZE * (1 + inode)) as usize)
    }

    /// Copy file bytes starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes copied: 0 for an out-of-range inode or
    /// an offset at or past the end of the file, short counts at the end.
    pub fn read_data(&self, inode: usize, offset: usize, buf: &mut [u8]) -> usize {
        let Some(size) = self.file_size(inode) else {
            return 0;
        };
        if offset >= size {
            return 0;
        }

        let inode_base = BLOCK_SIZE * (1 + inode);
        let data_base = BLOCK_SIZE * (1 + self.inode_count());
        let total = buf.len().min(size - offset);

        let mut copied = 0;
        while copied < total {
            let position = offset + copied;
            let block_slot = position / BLOCK_SIZE;
            let block_offset = position % BLOCK_SIZE;

            let index_offset = inode_base + 4 + block_slot * 4;
            if index_offset + 4 > self.image.len() {
                break;
            }
            let block_index = self.u32_at(index_offset) as usize;
            if block_index >= self.data_block_count() {
                break;
            }

            let chunk = (BLOCK_SIZE - block_offset).min(total - copied);
            let src = data_base + block_index * BLOCK_SIZE + block_offset;
            buf[copied..copied + chunk].copy_from_slice(&self.image[src..src + chunk]);
            copied += chunk;
        }
        copied
    }
}

// ---------------------------------------------------------------------------
// Global instance
// ---------------------------------------------------------------------------

static FILE_SYSTEM: spin::Once<FsImage<'static>> = spin::Once::new();

/// Adopt the boot-provided image as the system's file system.
pub fn init(image: &'static [u8]) -> KernelResult<()> {
    let fs = FsImage::new(image)?;
    log::info!(
        "fs: {} dentries, {} inodes, {} data blocks",
        fs.dentry_count(),
        fs.inode_count(),
        fs.data_block_count()
    );
    FILE_SYSTEM.call_once(|| fs);
    Ok(())
}

pub fn get() -> Option<&'static FsImage<'static>> {
    FILE_SYSTEM.get()
}

// ---------------------------------------------------------------------------
// File operations (installed by `open` per file type)
// ---------------------------------------------------------------------------

/// Regular-file read: copy from the current position, then advance it by
/// the bytes actually transferred.
pub fn file_read(fd: usize, buf: &mut [u8]) -> isize {
    let Some(fs) = get() else {
        return -1;
    };
    let Some((inode, position)) =
        process::with_current_pcb(|pcb| (pcb.fds[fd].inode, pcb.fds[fd].file_pos))
    else {
        return -1;
    };
    let copied = fs.read_data(inode as usize, position as usize, buf);
    process::with_current_pcb_mut(|pcb| {
        pcb.fds[fd].file_pos += copied as u32;
    });
    copied as isize
}

/// The file system is read-only.
pub fn file_write(_fd: usize, _buf: &[u8]) -> isize {
    -1
}

pub fn file_open() -> isize {
    0
}

pub fn file_close(_fd: usize) -> isize {
    0
}

/// Directory read: one dentry name per call, advancing the dentry index.
/// Returns the number of name bytes copied, 0 once the listing is done.
pub fn dir_read(fd: usize, buf: &mut [u8]) -> isize {
    let Some(fs) = get() else {
        return -1;
    };
    let Some(position) = process::with_current_pcb(|pcb| pcb.fds[fd].file_pos) else {
        return -1;
    };
    let Some(dentry) = fs.dentry_by_index(position as usize) else {
        return 0;
    };
    process::with_current_pcb_mut(|pcb| {
        pcb.fds[fd].file_pos += 1;
    });

    let name = dentry.name_bytes();
    let count = name.len().min(buf.len());
    buf[..count].copy_from_slice(&name[..count]);
    count as isize
}

pub fn dir_write(_fd: usize, _buf: &[u8]) -> isize {
    -1
}

pub fn dir_open() -> isize {
    0
}

pub fn dir_close(_fd: usize) -> isize {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec;
    use std::vec::Vec;

    /// Build a minimal image: the boot block, one inode per file, and one
    /// data block per file (files must fit in 4 KiB for this helper).
    pub(crate) fn build_image(files: &[(&[u8], u32, &[u8])]) -> Vec<u8> {
        let inode_count = files.len();
        let mut image = vec![0u8; BLOCK_SIZE * (1 + 2 * inode_count)];

        image[0..4].copy_from_slice(&(files.len() as u32).to_le_bytes());
        image[4..8].copy_from_slice(&(inode_count as u32).to_le_bytes());
        image[8..12].copy_from_slice(&(inode_count as u32).to_le_bytes());

        for (i, (name, ftype, contents)) in files.iter().enumerate() {
            let dentry = HEADER_SIZE + i * DENTRY_SIZE;
            image[dentry..dentry + name.len()].copy_from_slice(name);
            image[dentry + 32..dentry + 36].copy_from_slice(&ftype.to_le_bytes());
            image[dentry + 36..dentry + 40].copy_from_slice(&(i as u32).to_le_bytes());

            let inode = BLOCK_SIZE * (1 + i);
            image[inode..inode + 4].copy_from_slice(&(contents.len() as u32).to_le_bytes());
            image[inode + 4..inode + 8].copy_from_slice(&(i as u32).to_le_bytes());

            let data = BLOCK_SIZE * (1 + inode_count + i);
            image[data..data + contents.len()].copy_from_slice(contents);
        }
        image
    }

    #[test]
    fn lookup_by_name_and_index() {
        let image = build_image(&[
            (b".", 1, b""),
            (b"shell", 2, b"\x7fELF-shell"),
            (b"frame0.txt", 2, b"ascii art"),
        ]);
        let fs = FsImage::new(&image).unwrap();

        let d = fs.dentry_by_name(b"shell").unwrap();
        assert_eq!(d.file_type(), Some(FileType::Regular));
        assert_eq!(d.inode, 1);

        let d = fs.dentry_by_index(2).unwrap();
        assert_eq!(d.name_bytes(), b"frame0.txt");

        assert!(fs.dentry_by_name(b"missing").is_none());
        assert!(fs.dentry_by_index(3).is_none());
    }

    #[test]
    fn oversized_names_match_nothing() {
        let image = build_image(&[(b"shell", 2, b"x")]);
        let fs = FsImage::new(&image).unwrap();
        let long = [b'a'; 33];
        assert!(fs.dentry_by_name(&long).is_none());
        assert!(fs.dentry_by_name(b"").is_none());
    }

    #[test]
    fn read_data_bounds() {
        let contents = b"hello, file system";
        let image = build_image(&[(b"f", 2, contents)]);
        let fs = FsImage::new(&image).unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(fs.read_data(0, 0, &mut buf), contents.len());
        assert_eq!(&buf[..contents.len()], contents);

        // Offset inside the file: short read to the end.
        assert_eq!(fs.read_data(0, 7, &mut buf), contents.len() - 7);
        assert_eq!(&buf[..5], b"file ");

        // Offset at or past the end, bad inode: nothing.
        assert_eq!(fs.read_data(0, contents.len(), &mut buf), 0);
        assert_eq!(fs.read_data(0, 4096, &mut buf), 0);
        assert_eq!(fs.read_data(9, 0, &mut buf), 0);
    }

    #[test]
    fn read_data_respects_small_buffers() {
        let image = build_image(&[(b"f", 2, b"0123456789")]);
        let fs = FsImage::new(&image).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(fs.read_data(0, 2, &mut buf), 4);
        assert_eq!(&buf, b"2345");
    }

    #[test]
    fn truncated_image_rejected() {
        let image = build_image(&[(b"f", 2, b"data")]);
        assert!(FsImage::new(&image[..BLOCK_SIZE - 1]).is_err());

        // Counts claiming more blocks than the image holds.
        let mut forged = image.clone();
        forged[4..8].copy_from_slice(&100u32.to_le_bytes());
        assert!(FsImage::new(&forged).is_err());
    }

    #[test]
    fn file_type_mapping() {
        assert_eq!(FileType::from_raw(0), Some(FileType::Clock));
        assert_eq!(FileType::from_raw(1), Some(FileType::Directory));
        assert_eq!(FileType::from_raw(2), Some(FileType::Regular));
        assert_eq!(FileType::from_raw(3), None);
    }
}
