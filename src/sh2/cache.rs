//! SH-2 on-chip cache: 64 lines, four ways, direct tag/data arrays exposed
//! through partitions 011 and 100/110 of the address space. Timing is not
//! modeled (cache hits/misses do not modulate cycle counts) — an
//! intentionally open area, matched here with the associative-purge and
//! tag-array behavior hardware actually exposes.

pub const NUM_LINES: usize = 64;
pub const NUM_WAYS: usize = 4;
pub const LINE_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, Default)]
pub struct Tag {
    pub valid: bool,
    pub tag: u32,
}

pub struct Cache {
    pub enabled: bool,
    tags: [[Tag; NUM_WAYS]; NUM_LINES],
    data: Vec<u8>,
    lru: [u8; NUM_LINES],
}

impl Cache {
    pub fn new() -> Self {
        Cache {
            enabled: false,
            tags: [[Tag::default(); NUM_WAYS]; NUM_LINES],
            data: vec![0; NUM_LINES * NUM_WAYS * LINE_SIZE],
            lru: [0; NUM_LINES],
        }
    }

    fn line_index(addr: u32) -> usize {
        ((addr >> 4) & 0x3f) as usize
    }

    fn line_tag(addr: u32) -> u32 {
        addr >> 10
    }

    pub fn lookup(&self, addr: u32) -> Option<usize> {
        if !self.enabled {
            return None;
        }
        let line = Self::line_index(addr);
        let tag = Self::line_tag(addr);
        self.tags[line].iter().position(|t| t.valid && t.tag == tag)
    }

    fn lru_way(&self, line: usize) -> usize {
        // Least-significant set bit scheme: the way whose bit is clear in
        // the line's LRU byte is the victim.
        for way in 0..NUM_WAYS {
            if self.lru[line] & (1 << way) == 0 {
                return way;
            }
        }
        0
    }

    pub fn fill(&mut self, addr: u32, way: usize, bytes: &[u8; LINE_SIZE]) {
        let line = Self::line_index(addr);
        self.tags[line][way] = Tag { valid: true, tag: Self::line_tag(addr) };
        let base = (line * NUM_WAYS + way) * LINE_SIZE;
        self.data[base..base + LINE_SIZE].copy_from_slice(bytes);
        self.touch(line, way);
    }

    fn touch(&mut self, line: usize, way: usize) {
        self.lru[line] |= 1 << way;
        if self.lru[line] == (1 << NUM_WAYS) - 1 {
            self.lru[line] = 1 << way;
        }
    }

    pub fn victim_way(&self, addr: u32) -> usize {
        self.lru_way(Self::line_index(addr))
    }

    pub fn read_line(&self, addr: u32, way: usize) -> &[u8] {
        let line = Self::line_index(addr);
        let base = (line * NUM_WAYS + way) * LINE_SIZE;
        &self.data[base..base + LINE_SIZE]
    }

    /// Address-array associative purge: invalidates any way whose tag
    /// matches, regardless of which way actually hit.
    pub fn purge(&mut self, addr: u32) {
        let line = Self::line_index(addr);
        let tag = Self::line_tag(addr);
        for way in self.tags[line].iter_mut() {
            if way.valid && way.tag == tag {
                way.valid = false;
            }
        }
    }

    pub fn read_tag(&self, line: usize, way: usize) -> Tag {
        self.tags[line][way]
    }

    pub fn write_tag(&mut self, line: usize, way: usize, tag: Tag) {
        self.tags[line][way] = tag;
    }
}
