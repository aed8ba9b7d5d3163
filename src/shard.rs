use std::ops::Range;

use ahash::RandomState;
use anyhow::Result;
use hashbrown::HashTable;

use crate::config::ParseMode;
use crate::measurement::Measurement;
use crate::parse::{parse_record_strict, Records};

const ARENA_CAPACITY: usize = 8 * 1024;

struct Entry {
    start: usize,
    len: usize,
    measurement: Measurement
}

impl Entry {
    #[inline]
    fn span(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

pub struct Shard {
    arena: Vec<u8>,
    table: HashTable<Entry>,
    state: RandomState
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardStats {
    pub keys: usize,
    pub arena_bytes: usize,
    pub arena_capacity: usize,
    pub table_capacity: usize
}

impl Shard {
    pub fn new() -> Self {
        Self {
            arena: Vec::with_capacity(ARENA_CAPACITY),
            table: HashTable::new(),
            state: RandomState::new()
        }
    }

    #[inline]
    pub fn add(&mut self, key: &[u8], value: i64) {
        let hash = self.state.hash_one(key);
        let arena = &self.arena;
        if let Some(entry) = self.table.find_mut(hash, | entry | &arena[entry.span()] == key) {
            entry.measurement.update(value);
            return;
        }

        let start = self.arena.len();
        self.arena.extend_from_slice(key);

        let entry = Entry { start, len: key.len(), measurement: Measurement::new(value) };
        let (arena, state) = (&self.arena, &self.state);
        self.table.insert_unique(hash, entry, | entry | state.hash_one(&arena[entry.span()]));
    }

    pub fn parse_and_add_lines(&mut self, block: &[u8], mode: ParseMode) -> Result<()> {
        match mode {
            ParseMode::Lenient => {
                for (key, value) in Records::new(block) {
                    self.add(key, value);
                }
            },
            ParseMode::Strict => {
                let mut rest = block;
                while let Some((key, value, tail)) = parse_record_strict(rest)? {
                    self.add(key, value);
                    rest = tail;
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Option<&Measurement> {
        let hash = self.state.hash_one(key);
        self.table
            .find(hash, | entry | &self.arena[entry.span()] == key)
            .map(| entry | &entry.measurement)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Measurement)> + '_ {
        self.table
            .iter()
            .map(| entry | (&self.arena[entry.span()], &entry.measurement))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn stats(&self) -> ShardStats {
        ShardStats {
            keys: self.table.len(),
            arena_bytes: self.arena.len(),
            arena_capacity: self.arena.capacity(),
            table_capacity: self.table.capacity()
        }
    }
}

impl Default for Shard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interns_each_key_once() {
        let mut shard = Shard::new();
        shard.add(b"Hamburg", 120);
        shard.add(b"Oslo", -5);
        shard.add(b"Hamburg", 80);

        assert_eq!(shard.len(), 2);
        assert_eq!(shard.stats().arena_bytes, "HamburgOslo".len());
        let hamburg = shard.get(b"Hamburg").unwrap();
        assert_eq!(*hamburg, Measurement { minimum: 80, maximum: 120, count: 2, sum: 200 });
    }

    #[test]
    fn keys_outlive_the_scan_buffer() {
        let mut shard = Shard::new();
        {
            let mut buffer = b"abc;1.0\nabd;2.0\n".to_vec();
            shard.parse_and_add_lines(&buffer, ParseMode::Lenient).unwrap();
            buffer.fill(b'z');
        }
        let mut keys: Vec<_> = shard.iter().map(| (key, _) | key.to_vec()).collect();
        keys.sort();
        assert_eq!(keys, vec![b"abc".to_vec(), b"abd".to_vec()]);
    }

    #[test]
    fn survives_table_growth() {
        let mut shard = Shard::new();
        for round in 0..3 {
            for i in 0..5_000 {
                shard.add(format!("station-{i}").as_bytes(), round);
            }
        }
        assert_eq!(shard.len(), 5_000);
        for i in (0..5_000).step_by(499) {
            let m = shard.get(format!("station-{i}").as_bytes()).unwrap();
            assert_eq!((m.count, m.minimum, m.maximum, m.sum), (3, 0, 2, 3));
        }
    }

    #[test]
    fn strict_mode_reports_bad_record() {
        let mut shard = Shard::new();
        let result = shard.parse_and_add_lines(b"a;1.0\nb;oops\n", ParseMode::Strict);
        assert!(result.is_err());
        assert_eq!(shard.get(b"a").map(| m | m.count), Some(1));
    }

    #[test]
    fn strict_and_lenient_agree_on_clean_input() {
        let input = b"x;1.0\ny;2.5\nx;-3.0\n";
        let mut strict = Shard::new();
        let mut lenient = Shard::new();
        strict.parse_and_add_lines(input, ParseMode::Strict).unwrap();
        lenient.parse_and_add_lines(input, ParseMode::Lenient).unwrap();
        for key in [&b"x"[..], &b"y"[..]] {
            assert_eq!(strict.get(key), lenient.get(key));
        }
    }
}
