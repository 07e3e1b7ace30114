//! Backup-memory filesystem: a block-allocated directory emulated atop a
//! flat byte array, with import/export round-tripping two on-disk layouts.

use crate::error::{BackupFileError, BackupLoadResult, ImportResult};

pub const BLOCK_SIZE: usize = 64;
pub const SUPPORTED_SIZES: [usize; 5] = [32 * 1024, 512 * 1024, 1024 * 1024, 2 * 1024 * 1024, 4 * 1024 * 1024];

const HEADER_BLOCKS: usize = 4;
const NAME_LEN: usize = 11;
const COMMENT_LEN: usize = 10;

#[derive(Debug, Clone)]
pub struct BackupFile {
    pub name: String,
    pub comment: String,
    pub language: u8,
    pub date_minutes: u32,
    pub data: Vec<u8>,
}

impl BackupFile {
    pub fn to_ymbp(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(0x22 + self.data.len());
        out.extend_from_slice(b"YmBP");
        out.extend_from_slice(&pad_name(&self.name, NAME_LEN));
        out.push(self.language);
        out.extend_from_slice(&pad_name(&self.comment, COMMENT_LEN));
        out.extend_from_slice(&self.date_minutes.to_le_bytes());
        out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    pub fn from_ymbp(bytes: &[u8]) -> Result<Self, BackupFileError> {
        if bytes.len() < 0x22 {
            return Err(BackupFileError::FileTruncated);
        }
        if &bytes[0..4] != b"YmBP" {
            return Err(BackupFileError::BadMagic);
        }
        let name = read_cstr(&bytes[0x04..0x0f]);
        let language = bytes[0x0f];
        let comment = read_cstr(&bytes[0x10..0x1a]);
        let date_minutes = u32::from_le_bytes(bytes[0x1a..0x1e].try_into().unwrap());
        let size = u32::from_le_bytes(bytes[0x1e..0x22].try_into().unwrap()) as usize;
        if bytes.len() < 0x22 + size {
            return Err(BackupFileError::FileTruncated);
        }
        Ok(BackupFile { name, comment, language, date_minutes, data: bytes[0x22..0x22 + size].to_vec() })
    }

    pub fn to_bup(&self) -> Vec<u8> {
        let mut out = vec![0u8; 0x40 + self.data.len()];
        out[0x00..0x04].copy_from_slice(b"Vmem");
        // save ID is always zero, per the round-trip law.
        out[0x10..0x1c].copy_from_slice(&pad_name(&self.name, 12));
        out[0x1c..0x27].copy_from_slice(&pad_name(&self.comment, 11));
        out[0x27] = self.language;
        out[0x28..0x2c].copy_from_slice(&self.date_minutes.to_be_bytes());
        out[0x2c..0x30].copy_from_slice(&(self.data.len() as u32).to_be_bytes());
        let blocks = self.data.len().div_ceil(BLOCK_SIZE) as u16;
        out[0x30..0x32].copy_from_slice(&blocks.to_be_bytes());
        out[0x34..0x38].copy_from_slice(&self.date_minutes.to_be_bytes());
        out[0x40..].copy_from_slice(&self.data);
        out
    }

    pub fn from_bup(bytes: &[u8]) -> Result<Self, BackupFileError> {
        if bytes.len() < 0x40 {
            return Err(BackupFileError::FileTruncated);
        }
        if &bytes[0..4] != b"Vmem" {
            return Err(BackupFileError::BadMagic);
        }
        let name = read_cstr(&bytes[0x10..0x1c]);
        let comment = read_cstr(&bytes[0x1c..0x27]);
        let language = bytes[0x27];
        let date_minutes = u32::from_be_bytes(bytes[0x28..0x2c].try_into().unwrap());
        let size = u32::from_be_bytes(bytes[0x2c..0x30].try_into().unwrap()) as usize;
        if bytes.len() < 0x40 + size {
            return Err(BackupFileError::FileTruncated);
        }
        Ok(BackupFile { name, comment, language, date_minutes, data: bytes[0x40..0x40 + size].to_vec() })
    }
}

fn pad_name(name: &str, len: usize) -> Vec<u8> {
    let mut bytes = name.as_bytes().to_vec();
    bytes.truncate(len);
    bytes.resize(len, 0);
    bytes
}

fn read_cstr(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Per-block directory metadata: `in_use` marks whether the block belongs
/// to any file's chain, `next` chains it to the following block (`None` at
/// a chain's tail). Head blocks carry file metadata, data blocks are
/// anonymous and only chained via `next`.
#[derive(Debug, Clone, Copy, Default)]
struct BlockEntry {
    in_use: bool,
    next: Option<u16>,
}

/// Byte offset of the head-block directory table within the header region.
const DIRECTORY_TABLE_OFFSET: usize = 8;
/// Usable bytes in a head block after its metadata fields, before the
/// trailing `next` pointer.
const HEAD_PAYLOAD: usize = BLOCK_SIZE - 2 - 30;
/// Usable bytes in a continuation (data) block, before the trailing `next`
/// pointer.
const DATA_PAYLOAD: usize = BLOCK_SIZE - 2;

/// A block-allocated filesystem over a flat byte array, matching the
/// Saturn's internal/cartridge backup-memory layout: a header block, a
/// block-usage directory, and file chains linked by a per-block `next`
/// pointer.
pub struct BackupMemory {
    size: usize,
    blocks: Vec<BlockEntry>,
    files: Vec<BackupFile>,
    /// Head block index of `files[i]`, kept parallel to `files`.
    file_heads: Vec<u16>,
}

impl BackupMemory {
    pub fn new(size: usize) -> Result<Self, BackupFileError> {
        if !SUPPORTED_SIZES.contains(&size) {
            return Err(BackupFileError::FilesystemError);
        }
        let num_blocks = size / BLOCK_SIZE;
        Ok(BackupMemory { size, blocks: vec![BlockEntry::default(); num_blocks], files: Vec::new(), file_heads: Vec::new() })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn format(&mut self) {
        self.blocks.iter_mut().for_each(|b| *b = BlockEntry::default());
        self.files.clear();
        self.file_heads.clear();
    }

    pub fn list(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn read(&self, name: &str) -> Option<&BackupFile> {
        self.files.iter().find(|f| f.name == name)
    }

    fn blocks_needed(&self, data_len: usize) -> usize {
        if data_len <= HEAD_PAYLOAD {
            1
        } else {
            1 + (data_len - HEAD_PAYLOAD).div_ceil(DATA_PAYLOAD)
        }
    }

    pub fn free_blocks(&self) -> usize {
        self.blocks.iter().skip(HEADER_BLOCKS).filter(|b| !b.in_use).count()
    }

    /// Allocates `count` free blocks (not necessarily contiguous) and
    /// chains them together, returning the head block's index.
    fn alloc_chain(&mut self, count: usize) -> Option<u16> {
        let free: Vec<u16> = (HEADER_BLOCKS..self.blocks.len()).filter(|&i| !self.blocks[i].in_use).take(count).map(|i| i as u16).collect();
        if free.len() < count {
            return None;
        }
        for (pos, &idx) in free.iter().enumerate() {
            self.blocks[idx as usize] = BlockEntry { in_use: true, next: free.get(pos + 1).copied() };
        }
        Some(free[0])
    }

    fn free_chain(&mut self, mut head: u16) {
        loop {
            let entry = &mut self.blocks[head as usize];
            let next = entry.next;
            *entry = BlockEntry::default();
            match next {
                Some(n) => head = n,
                None => break,
            }
        }
    }

    /// Removes the named file's chain, if present, returning its index in
    /// `files`/`file_heads` before removal.
    fn reclaim(&mut self, name: &str) -> Option<usize> {
        let pos = self.files.iter().position(|f| f.name == name)?;
        self.free_chain(self.file_heads[pos]);
        self.files.remove(pos);
        self.file_heads.remove(pos);
        Some(pos)
    }

    pub fn write(&mut self, file: BackupFile) -> Result<(), BackupFileError> {
        let needed = self.blocks_needed(file.data.len());
        let reclaimable = self.files.iter().find(|f| f.name == file.name).map(|f| self.blocks_needed(f.data.len())).unwrap_or(0);
        if needed > self.free_blocks() + reclaimable {
            return Err(BackupFileError::FilesystemError);
        }
        self.reclaim(&file.name);
        let head = self.alloc_chain(needed).ok_or(BackupFileError::FilesystemError)?;
        self.files.push(file);
        self.file_heads.push(head);
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> bool {
        self.reclaim(name).is_some()
    }

    pub fn import_file(&mut self, file: BackupFile, overwrite: bool) -> ImportResult {
        let exists = self.files.iter().any(|f| f.name == file.name);
        if exists && !overwrite {
            return ImportResult::FileExists;
        }
        let needed = self.blocks_needed(file.data.len());
        let reclaimable = self.files.iter().find(|f| f.name == file.name).map(|f| self.blocks_needed(f.data.len())).unwrap_or(0);
        if needed > self.free_blocks() + reclaimable {
            return ImportResult::NoSpace;
        }
        self.reclaim(&file.name);
        let Some(head) = self.alloc_chain(needed) else {
            return ImportResult::NoSpace;
        };
        self.files.push(file);
        self.file_heads.push(head);
        if exists {
            ImportResult::Overwritten
        } else {
            ImportResult::Imported
        }
    }

    pub fn export(&self, name: &str) -> Option<BackupFile> {
        self.read(name).cloned()
    }

    pub fn export_all(&self) -> Vec<BackupFile> {
        self.files.clone()
    }

    /// Serializes the current directory and every file's block chain into
    /// a flat image the same size as this volume.
    pub fn to_image(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.size];
        out[0..4].copy_from_slice(b"BKUP");
        out[4..6].copy_from_slice(&(self.blocks.len() as u16).to_le_bytes());
        for (slot, (&head, file)) in self.file_heads.iter().zip(self.files.iter()).enumerate() {
            let table_off = DIRECTORY_TABLE_OFFSET + slot * 2;
            out[table_off..table_off + 2].copy_from_slice(&head.to_le_bytes());
            self.write_chain(&mut out, head, file);
        }
        out
    }

    fn write_chain(&self, out: &mut [u8], head: u16, file: &BackupFile) {
        let mut remaining = file.data.as_slice();
        let head_off = head as usize * BLOCK_SIZE;
        out[head_off..head_off + NAME_LEN].copy_from_slice(&pad_name(&file.name, NAME_LEN));
        out[head_off + NAME_LEN..head_off + NAME_LEN + COMMENT_LEN].copy_from_slice(&pad_name(&file.comment, COMMENT_LEN));
        out[head_off + 21] = file.language;
        out[head_off + 22..head_off + 26].copy_from_slice(&file.date_minutes.to_le_bytes());
        out[head_off + 26..head_off + 30].copy_from_slice(&(file.data.len() as u32).to_le_bytes());
        let head_payload = HEAD_PAYLOAD.min(remaining.len());
        out[head_off + 30..head_off + 30 + head_payload].copy_from_slice(&remaining[..head_payload]);
        remaining = &remaining[head_payload..];

        let mut block_idx = head;
        loop {
            let next = self.blocks[block_idx as usize].next;
            let trailer_off = block_idx as usize * BLOCK_SIZE + BLOCK_SIZE - 2;
            out[trailer_off..trailer_off + 2].copy_from_slice(&next.unwrap_or(0).to_le_bytes());
            let Some(n) = next else { break };
            block_idx = n;
            let off = block_idx as usize * BLOCK_SIZE;
            let take = remaining.len().min(DATA_PAYLOAD);
            out[off..off + take].copy_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
        }
    }

    /// Parses a previously-serialized image (see `to_image`) back into a
    /// populated volume, validating the directory and every block chain.
    pub fn load_from(bytes: &[u8]) -> Result<BackupMemory, BackupLoadResult> {
        if !SUPPORTED_SIZES.contains(&bytes.len()) {
            return Err(BackupLoadResult::InvalidSize);
        }
        if bytes.len() < HEADER_BLOCKS * BLOCK_SIZE || &bytes[0..4] != b"BKUP" {
            return Err(BackupLoadResult::FilesystemError);
        }
        let num_blocks = bytes.len() / BLOCK_SIZE;
        let mut mem = BackupMemory { size: bytes.len(), blocks: vec![BlockEntry::default(); num_blocks], files: Vec::new(), file_heads: Vec::new() };

        let max_entries = (HEADER_BLOCKS * BLOCK_SIZE - DIRECTORY_TABLE_OFFSET) / 2;
        for slot in 0..max_entries {
            let off = DIRECTORY_TABLE_OFFSET + slot * 2;
            let head = u16::from_le_bytes(bytes[off..off + 2].try_into().unwrap());
            if head == 0 {
                continue;
            }
            mem.load_chain(bytes, head, num_blocks).ok_or(BackupLoadResult::FilesystemError)?;
        }
        Ok(mem)
    }

    /// Walks one file's on-disk chain starting at `head`, validating every
    /// link and recording it into `self.blocks`/`self.files`.
    fn load_chain(&mut self, bytes: &[u8], head: u16, num_blocks: usize) -> Option<()> {
        let head_idx = head as usize;
        if head_idx < HEADER_BLOCKS || head_idx >= num_blocks {
            return None;
        }
        let head_off = head_idx * BLOCK_SIZE;
        let block = &bytes[head_off..head_off + BLOCK_SIZE];
        let name = read_cstr(&block[0..NAME_LEN]);
        let comment = read_cstr(&block[NAME_LEN..NAME_LEN + COMMENT_LEN]);
        let language = block[21];
        let date_minutes = u32::from_le_bytes(block[22..26].try_into().unwrap());
        let size = u32::from_le_bytes(block[26..30].try_into().unwrap()) as usize;

        let mut data = Vec::with_capacity(size);
        let head_payload = HEAD_PAYLOAD.min(size);
        data.extend_from_slice(&block[30..30 + head_payload]);
        let mut next = u16::from_le_bytes(block[BLOCK_SIZE - 2..BLOCK_SIZE].try_into().unwrap());
        self.blocks[head_idx] = BlockEntry { in_use: true, next: (next != 0).then_some(next) };

        while data.len() < size {
            if next == 0 {
                return None;
            }
            let idx = next as usize;
            if idx < HEADER_BLOCKS || idx >= num_blocks {
                return None;
            }
            let off = idx * BLOCK_SIZE;
            let chunk = &bytes[off..off + BLOCK_SIZE];
            let take = (size - data.len()).min(DATA_PAYLOAD);
            data.extend_from_slice(&chunk[0..take]);
            let chunk_next = u16::from_le_bytes(chunk[BLOCK_SIZE - 2..BLOCK_SIZE].try_into().unwrap());
            self.blocks[idx] = BlockEntry { in_use: true, next: (chunk_next != 0).then_some(chunk_next) };
            next = chunk_next;
        }

        self.files.push(BackupFile { name, comment, language, date_minutes, data });
        self.file_heads.push(head);
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file(name: &str, len: usize) -> BackupFile {
        BackupFile {
            name: name.to_string(),
            comment: "a save".to_string(),
            language: 0,
            date_minutes: 12345,
            data: (0..len).map(|i| (i % 251) as u8).collect(),
        }
    }

    #[test]
    fn write_then_read_round_trips_small_and_multi_block_files() {
        let mut mem = BackupMemory::new(32 * 1024).unwrap();
        mem.write(sample_file("SAVE1", 10)).unwrap();
        mem.write(sample_file("SAVE2", 500)).unwrap();

        assert_eq!(mem.read("SAVE1").unwrap().data.len(), 10);
        let big = mem.read("SAVE2").unwrap();
        assert_eq!(big.data.len(), 500);
        assert_eq!(big.data, sample_file("SAVE2", 500).data);
    }

    #[test]
    fn delete_frees_the_blocks_it_used() {
        let mut mem = BackupMemory::new(32 * 1024).unwrap();
        let free_before = mem.free_blocks();
        mem.write(sample_file("SAVE1", 500)).unwrap();
        assert!(mem.free_blocks() < free_before);
        assert!(mem.delete("SAVE1"));
        assert_eq!(mem.free_blocks(), free_before);
        assert!(mem.read("SAVE1").is_none());
    }

    #[test]
    fn overwriting_a_file_reclaims_its_old_chain_first() {
        let mut mem = BackupMemory::new(32 * 1024).unwrap();
        mem.write(sample_file("SAVE1", 500)).unwrap();
        let free_after_first = mem.free_blocks();
        mem.write(sample_file("SAVE1", 40)).unwrap();
        assert!(mem.free_blocks() > free_after_first);
        assert_eq!(mem.read("SAVE1").unwrap().data.len(), 40);
    }

    #[test]
    fn import_file_reports_exists_without_overwrite_and_overwritten_with() {
        let mut mem = BackupMemory::new(32 * 1024).unwrap();
        mem.write(sample_file("SAVE1", 10)).unwrap();
        assert_eq!(mem.import_file(sample_file("SAVE1", 20), false), ImportResult::FileExists);
        assert_eq!(mem.import_file(sample_file("SAVE1", 20), true), ImportResult::Overwritten);
        assert_eq!(mem.read("SAVE1").unwrap().data.len(), 20);
    }

    #[test]
    fn import_file_reports_no_space_when_volume_is_full() {
        let mut mem = BackupMemory::new(32 * 1024).unwrap();
        let free = mem.free_blocks();
        let result = mem.import_file(sample_file("HUGE", free * BLOCK_SIZE + 1), false);
        assert_eq!(result, ImportResult::NoSpace);
    }

    #[test]
    fn to_image_then_load_from_round_trips_every_file() {
        let mut mem = BackupMemory::new(32 * 1024).unwrap();
        mem.write(sample_file("SAVE1", 10)).unwrap();
        mem.write(sample_file("SAVE2", 500)).unwrap();

        let image = mem.to_image();
        let loaded = BackupMemory::load_from(&image).unwrap();

        assert_eq!(loaded.read("SAVE1").unwrap().data, mem.read("SAVE1").unwrap().data);
        assert_eq!(loaded.read("SAVE2").unwrap().data, mem.read("SAVE2").unwrap().data);
        assert_eq!(loaded.read("SAVE2").unwrap().date_minutes, 12345);
    }

    #[test]
    fn load_from_rejects_wrong_size() {
        let bytes = vec![0u8; 100];
        assert_eq!(BackupMemory::load_from(&bytes), Err(BackupLoadResult::InvalidSize));
    }

    #[test]
    fn load_from_rejects_bad_magic() {
        let bytes = vec![0u8; 32 * 1024];
        assert_eq!(BackupMemory::load_from(&bytes), Err(BackupLoadResult::FilesystemError));
    }

    #[test]
    fn ymbp_and_bup_file_formats_round_trip() {
        let file = sample_file("SAVE1", 100);
        let ymbp = file.to_ymbp();
        let back = BackupFile::from_ymbp(&ymbp).unwrap();
        assert_eq!(back.name, file.name);
        assert_eq!(back.data, file.data);

        let bup = file.to_bup();
        let back = BackupFile::from_bup(&bup).unwrap();
        assert_eq!(back.name, file.name);
        assert_eq!(back.data, file.data);
    }
}
