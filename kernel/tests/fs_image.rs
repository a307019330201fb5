//! File-system integration tests against synthetic on-disk images.

use trios_kernel::fs::{FileType, FsImage, BLOCK_SIZE};

const HEADER_SIZE: usize = 64;
const DENTRY_SIZE: usize = 64;

/// Image builder mirroring the on-disk layout: boot block, inode blocks,
/// data blocks. Files may span multiple data blocks.
struct ImageBuilder {
    files: Vec<(Vec<u8>, u32, Vec<u8>)>,
}

impl ImageBuilder {
    fn new() -> Self {
        Self { files: Vec::new() }
    }

    fn file(mut self, name: &[u8], ftype: u32, contents: &[u8]) -> Self {
        self.files.push((name.to_vec(), ftype, contents.to_vec()));
        self
    }

    fn build(self) -> Vec<u8> {
        let inode_count = self.files.len();
        let data_block_count: usize = self
            .files
            .iter()
            .map(|(_, _, c)| c.len().div_ceil(BLOCK_SIZE).max(1))
            .sum();

        let mut image = vec![0u8; BLOCK_SIZE * (1 + inode_count + data_block_count)];
        image[0..4].copy_from_slice(&(self.files.len() as u32).to_le_bytes());
        image[4..8].copy_from_slice(&(inode_count as u32).to_le_bytes());
        image[8..12].copy_from_slice(&(data_block_count as u32).to_le_bytes());

        let mut next_block = 0u32;
        for (i, (name, ftype, contents)) in self.files.iter().enumerate() {
            let dentry = HEADER_SIZE + i * DENTRY_SIZE;
            image[dentry..dentry + name.len()].copy_from_slice(name);
            image[dentry + 32..dentry + 36].copy_from_slice(&ftype.to_le_bytes());
            image[dentry + 36..dentry + 40].copy_from_slice(&(i as u32).to_le_bytes());

            let inode = BLOCK_SIZE * (1 + i);
            image[inode..inode + 4].copy_from_slice(&(contents.len() as u32).to_le_bytes());

            for (slot, chunk) in contents.chunks(BLOCK_SIZE).enumerate() {
                let index_off = inode + 4 + slot * 4;
                image[index_off..index_off + 4].copy_from_slice(&next_block.to_le_bytes());
                let data = BLOCK_SIZE * (1 + inode_count + next_block as usize);
                image[data..data + chunk.len()].copy_from_slice(chunk);
                next_block += 1;
            }
            if contents.is_empty() {
                next_block += 1;
            }
        }
        image
    }
}

/// A minimal executable image: the magic header, the entry point at bytes
/// 24..27, and some padding.
fn fake_executable(entry_point: u32) -> Vec<u8> {
    let mut body = vec![0u8; 64];
    body[0..4].copy_from_slice(&[0x7F, b'E', b'L', b'F']);
    body[24..28].copy_from_slice(&entry_point.to_le_bytes());
    body
}

#[test]
fn seeded_image_lookups() {
    let image = ImageBuilder::new()
        .file(b".", 1, b"")
        .file(b"clock", 0, b"")
        .file(b"shell", 2, &fake_executable(0x0804_80A0))
        .file(b"frame0.txt", 2, b"/\\/\\ ascii fish /\\/\\")
        .build();
    let fs = FsImage::new(&image).unwrap();

    assert_eq!(fs.dentry_count(), 4);

    let shell = fs.dentry_by_name(b"shell").unwrap();
    assert_eq!(shell.file_type(), Some(FileType::Regular));

    let clock = fs.dentry_by_name(b"clock").unwrap();
    assert_eq!(clock.file_type(), Some(FileType::Clock));

    let dir = fs.dentry_by_index(0).unwrap();
    assert_eq!(dir.file_type(), Some(FileType::Directory));
}

#[test]
fn executable_header_round_trip() {
    let entry_point = 0x0804_9123;
    let image = ImageBuilder::new()
        .file(b"prog", 2, &fake_executable(entry_point))
        .build();
    let fs = FsImage::new(&image).unwrap();
    let dentry = fs.dentry_by_name(b"prog").unwrap();

    let mut header = [0u8; 28];
    assert_eq!(fs.read_data(dentry.inode as usize, 0, &mut header), 28);
    assert_eq!(&header[..4], &[0x7F, b'E', b'L', b'F']);
    assert_eq!(
        u32::from_le_bytes(header[24..28].try_into().unwrap()),
        entry_point
    );
}

#[test]
fn non_executable_magic_detected() {
    // First four bytes 0x7F 'E' 'L' 'G': a loader must reject this.
    let mut body = fake_executable(0x0804_8000);
    body[3] = b'G';
    let image = ImageBuilder::new().file(b"bad", 2, &body).build();
    let fs = FsImage::new(&image).unwrap();

    let mut header = [0u8; 4];
    fs.read_data(0, 0, &mut header);
    assert_ne!(&header, &[0x7F, b'E', b'L', b'F']);
}

#[test]
fn multi_block_file_reads_across_boundaries() {
    let contents: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let image = ImageBuilder::new().file(b"big", 2, &contents).build();
    let fs = FsImage::new(&image).unwrap();

    // Whole file.
    let mut buf = vec![0u8; contents.len()];
    assert_eq!(fs.read_data(0, 0, &mut buf), contents.len());
    assert_eq!(buf, contents);

    // A window straddling the first block boundary.
    let mut window = [0u8; 64];
    assert_eq!(fs.read_data(0, BLOCK_SIZE - 32, &mut window), 64);
    assert_eq!(&window[..32], &contents[BLOCK_SIZE - 32..BLOCK_SIZE]);
    assert_eq!(&window[32..], &contents[BLOCK_SIZE..BLOCK_SIZE + 32]);

    // Tail read returns the short count.
    let mut tail = [0u8; 128];
    assert_eq!(fs.read_data(0, contents.len() - 40, &mut tail), 40);
}

#[test]
fn directory_enumeration_in_order() {
    let image = ImageBuilder::new()
        .file(b".", 1, b"")
        .file(b"alpha", 2, b"a")
        .file(b"beta", 2, b"b")
        .build();
    let fs = FsImage::new(&image).unwrap();

    let names: Vec<_> = (0..fs.dentry_count())
        .map(|i| fs.dentry_by_index(i).unwrap().name_bytes().to_vec())
        .collect();
    assert_eq!(names, vec![b".".to_vec(), b"alpha".to_vec(), b"beta".to_vec()]);
}
