use std::io::{Read, Write};

/// One bit per 24-bit address
#[derive(Clone, PartialEq, Eq)]
pub struct AddressSet {
    words: Vec<u64>,
}

const ADDRESS_COUNT: usize = 1 << 24;
const WORD_COUNT: usize = ADDRESS_COUNT / 64;

impl Default for AddressSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AddressSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressSet").field("len", &self.len()).finish()
    }
}

impl AddressSet {
    pub fn new() -> Self {
        AddressSet {
            words: vec![0; WORD_COUNT],
        }
    }

    fn locate(address: u32) -> (usize, u64) {
        let address = (address & 0xFF_FFFF) as usize;
        (address / 64, 1u64 << (address % 64))
    }

    pub fn insert(&mut self, address: u32) {
        let (word, bit) = Self::locate(address);
        self.words[word] |= bit;
    }

    pub fn remove(&mut self, address: u32) {
        let (word, bit) = Self::locate(address);
        self.words[word] &= !bit;
    }

    /// Inclusive on both ends
    pub fn insert_range(&mut self, first: u32, last: u32) {
        for address in (first & 0xFF_FFFF)..=(last & 0xFF_FFFF) {
            self.insert(address);
        }
    }

    pub fn contains(&self, address: u32) -> bool {
        let (word, bit) = Self::locate(address);
        self.words[word] & bit != 0
    }

    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|word| *word = 0);
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    pub fn union_with(&mut self, other: &AddressSet) {
        for (word, add) in self.words.iter_mut().zip(&other.words) {
            *word |= add;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(index, &word)| {
            (0..64u32)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| index as u32 * 64 + bit)
        })
    }

    pub fn write_to<W: Write>(&self, sink: &mut W) -> std::io::Result<()> {
        for word in &self.words {
            sink.write_all(&word.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(source: &mut R) -> std::io::Result<AddressSet> {
        let mut set = AddressSet::new();
        let mut bytes = [0u8; 8];
        for word in set.words.iter_mut() {
            source.read_exact(&mut bytes)?;
            *word = u64::from_le_bytes(bytes);
        }
        Ok(set)
    }
}
