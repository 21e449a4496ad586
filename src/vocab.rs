//  Copyright 2026 Robert Zavalczki
//  Copyright 2013 Google Inc. All Rights Reserved.
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};

use crate::Error;
use crate::chars::FileCharIterator;
use crate::huffman;

/// The sentence boundary occupies vocabulary index 0. Newlines in the
/// training data map to it, so no real vocabulary entry is a newline.
pub const SENTENCE_BREAK: char = '\n';

/// `reduce_vocab` keeps the entry count below 70% of this ceiling.
const MAX_VOCAB_ENTRIES: usize = 30_000_000;

const UNIGRAM_TABLE_SIZE: usize = 100_000_000;

pub struct CharInfo {
    pub ch: char,
    pub cn: i64,
    /// Huffman code bits, topmost decision first. At most 40 long.
    pub code: Vec<u8>,
    /// Internal tree nodes along the code, as row indices of the
    /// hierarchical softmax output matrix. Same length as `code`.
    pub point: Vec<i32>,
}

impl CharInfo {
    pub fn new(ch: char, cn: i64) -> CharInfo {
        CharInfo { ch, cn, code: Vec::new(), point: Vec::new() }
    }
}

pub struct Vocabulary {
    chars: Vec<CharInfo>,
    index: HashMap<char, i32>,
    train_chars: u64,
    min_reduce: i64,
    unigram_table: Vec<i32>,
}

impl Vocabulary {
    pub fn learn_from_training_file(
        file_name: &str,
        min_count: i64,
        debug_mode: i32,
    ) -> std::io::Result<Vocabulary> {
        let mut vocab = Vocabulary::new();
        let mut fi = FileCharIterator::new(file_name, 0)?;
        while let Some(ch) = fi.read_char() {
            vocab.add_char(ch);
            if debug_mode > 1 && vocab.train_chars % 1_000_000 == 0 {
                eprint!("{}K\r", vocab.train_chars / 1000);
            }
        }
        vocab.sort_vocab(min_count);
        Ok(vocab)
    }

    pub fn save_to_file(&self, vocab_file: &str) -> std::io::Result<()> {
        let mut buf_writer: BufWriter<File> = BufWriter::new(File::create(vocab_file)?);
        for c in self.chars.iter() {
            writeln!(buf_writer, "{} {}", c.ch, c.cn)?;
        }
        Ok(())
    }

    /// Load a vocabulary saved by [`save_to_file`](Self::save_to_file). The
    /// sort and the min-count filter are re-applied, and the sentence break
    /// is re-anchored at index 0 whatever the file order was.
    pub fn load_from_file(vocab_file: &str, min_count: i64) -> Result<Vocabulary, Error> {
        let data = std::fs::read(vocab_file)?;
        let text = String::from_utf8_lossy(&data);
        let mut vocab = Vocabulary::new();

        let mut it = text.chars();
        while let Some(ch) = it.next() {
            if it.next() != Some(' ') {
                return Err(Error::InvalidVocab(format!(
                    "expected a space after character {ch:?}"
                )));
            }
            let mut digits = String::new();
            for c in it.by_ref() {
                if c == '\n' {
                    break;
                }
                digits.push(c);
            }
            let cn: i64 = digits
                .trim()
                .parse()
                .map_err(|_| Error::InvalidVocab(format!("bad count {digits:?} for {ch:?}")))?;
            vocab.add_char_with_count(ch, cn);
        }

        if vocab.chars.len() < 2 {
            return Err(Error::InvalidVocab("empty vocabulary".to_string()));
        }

        vocab.sort_vocab(min_count);
        Ok(vocab)
    }

    /// return the character's vocabulary index, -1 if not found
    pub fn search_char(&self, ch: char) -> i32 {
        match self.index.get(&ch) {
            Some(&idx) => idx,
            None => -1,
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn train_chars(&self) -> u64 {
        self.train_chars
    }

    pub fn entry(&self, idx: usize) -> &CharInfo {
        &self.chars[idx]
    }

    pub fn entries(&self) -> std::slice::Iter<'_, CharInfo> {
        self.chars.iter()
    }

    pub fn print_summary(&self) {
        eprintln!("Vocab size: {}", self.chars.len());
        eprintln!("Characters in train file: {}", self.train_chars);
    }

    /// Fill in the Huffman code and tree path of every entry.
    pub fn build_huffman_tree(&mut self) {
        huffman::create_binary_tree(&mut self.chars);
    }

    // Pick a random character to use as a 'negative sample'; do this using
    // the unigram table.
    pub fn sample_random_char(&self, rand_seed: u64) -> i32 {
        debug_assert!(!self.unigram_table.is_empty());
        let idx = (rand_seed >> 16) as usize % self.unigram_table.len();
        let mut target = self.unigram_table[idx];
        // The sentence break is not a valid negative sample; substitute a
        // random real character.
        if target == 0 {
            target = (rand_seed as usize % (self.chars.len() - 1) + 1) as i32;
        }
        target
    }

    fn new() -> Self {
        let mut vocab = Vocabulary {
            chars: vec![CharInfo::new(SENTENCE_BREAK, 0)],
            index: HashMap::new(),
            train_chars: 0,
            min_reduce: 1,
            unigram_table: Vec::new(),
        };
        vocab.index.insert(SENTENCE_BREAK, 0);
        vocab
    }

    fn add_char(&mut self, ch: char) {
        match self.index.get(&ch) {
            Some(&idx) => self.chars[idx as usize].cn += 1,
            None => {
                self.index.insert(ch, self.chars.len() as i32);
                self.chars.push(CharInfo::new(ch, 1));
            }
        }
        self.train_chars += 1;

        if self.chars.len() as f64 > 0.7 * MAX_VOCAB_ENTRIES as f64 {
            self.reduce_vocab();
        }
    }

    fn add_char_with_count(&mut self, ch: char, cn: i64) {
        match self.index.get(&ch) {
            Some(&idx) => self.chars[idx as usize].cn += cn,
            None => {
                self.index.insert(ch, self.chars.len() as i32);
                self.chars.push(CharInfo::new(ch, cn));
            }
        }
        self.train_chars += cn as u64;
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        self.train_chars = 0;
        for (idx, c) in self.chars.iter().enumerate() {
            self.index.insert(c.ch, idx as i32);
            self.train_chars += c.cn as u64;
        }
    }

    /// Drop infrequent entries so the vocabulary stays bounded during the
    /// counting pass. The removal threshold ratchets up on every call.
    fn reduce_vocab(&mut self) {
        log::debug!("reducing vocabulary below {} entries", self.chars.len());
        let threshold = self.min_reduce;
        let mut idx = 0;
        self.chars.retain(|c| {
            let keep = idx == 0 || c.cn > threshold;
            idx += 1;
            keep
        });
        self.min_reduce += 1;
        self.rebuild_index();
    }

    /// Sort the real entries by descending count, keeping the sentence
    /// break at index 0, and discard entries below `min_count`.
    fn sort_vocab(&mut self, min_count: i64) {
        log::debug!("sorting vocabulary of {} entries", self.chars.len());
        self.chars[1..].sort_by_key(|c| std::cmp::Reverse(c.cn));
        let idx = self.chars[1..].partition_point(|c| c.cn >= min_count);
        self.chars.truncate(idx + 1);
        self.rebuild_index();
    }

    pub fn init_unigram_table(&mut self) {
        log::debug!("initializing the unigram table");
        self.unigram_table = build_unigram_table(&self.chars, UNIGRAM_TABLE_SIZE);
    }

    #[cfg(test)]
    pub(crate) fn init_unigram_table_for_tests(&mut self, table_size: usize) {
        self.unigram_table = build_unigram_table(&self.chars, table_size);
    }
}

// Initialize the table according to the character count distribution raised
// to the 3/4 power. Entries whose cumulative share is already exhausted are
// skipped before a slot is written, so zero-count entries (the sentence
// break before any newline was seen) occupy no slots.
fn build_unigram_table(chars: &[CharInfo], table_size: usize) -> Vec<i32> {
    assert!(!chars.is_empty());

    const CHAR_POWER: f64 = 0.75;
    let train_chars_pow: f64 = chars
        .iter()
        .fold(0.0f64, |acc, c| acc + f64::powf(c.cn as f64, CHAR_POWER));

    let mut table = vec![0i32; table_size];
    let mut char_idx: usize = 0;
    let mut frac: f64 = f64::powf(chars[0].cn as f64, CHAR_POWER) / train_chars_pow;
    for (idx, slot) in table.iter_mut().enumerate() {
        while idx as f64 / table_size as f64 >= frac && char_idx < chars.len() - 1 {
            char_idx += 1;
            frac += f64::powf(chars[char_idx].cn as f64, CHAR_POWER) / train_chars_pow;
        }
        *slot = char_idx as i32;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn learn(corpus: &str, min_count: i64) -> Vocabulary {
        let mut f = tempfile::NamedTempFile::new().expect("create temp file");
        f.write_all(corpus.as_bytes()).expect("write temp file");
        Vocabulary::learn_from_training_file(&f.path().to_string_lossy(), min_count, 0)
            .expect("learn vocabulary")
    }

    #[test]
    fn counts_and_sorts_by_descending_frequency() {
        let vocab = learn("aaabbc\naaab\n", 1);
        // sentence break at index 0, then a(6), b(3), c(1)
        assert_eq!(vocab.entry(0).ch, SENTENCE_BREAK);
        assert_eq!(vocab.entry(0).cn, 2);
        for i in 1..vocab.len() - 1 {
            assert!(vocab.entry(i).cn >= vocab.entry(i + 1).cn);
        }
        assert_eq!(vocab.entry(1).ch, 'a');
        assert_eq!(vocab.entry(1).cn, 6);
        assert_eq!(vocab.search_char('c'), 3);
        assert_eq!(vocab.search_char('z'), -1);
        assert_eq!(vocab.train_chars(), 12);
    }

    #[test]
    fn min_count_discards_rare_chars_but_not_the_sentence_break() {
        let vocab = learn("aaabbc\n", 2);
        // 'c' (1) is dropped, the sentence break (1) stays
        assert_eq!(vocab.search_char('c'), -1);
        assert_eq!(vocab.entry(0).ch, SENTENCE_BREAK);
        assert_eq!(vocab.len(), 3);
        // train_chars only counts surviving entries
        assert_eq!(vocab.train_chars(), 6);
    }

    #[test]
    fn newline_maps_to_the_sentinel() {
        let vocab = learn("abcabcabcabcabc\n", 1);
        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab.search_char('\n'), 0);
    }

    #[test]
    fn reduce_vocab_ratchets_the_threshold() {
        let mut vocab = learn("aaaabbbccd\n", 1);
        vocab.reduce_vocab();
        // threshold 1: 'd' (1) goes, the sentence break (1) stays because
        // index 0 is exempt
        assert_eq!(vocab.search_char('d'), -1);
        assert_eq!(vocab.entry(0).ch, SENTENCE_BREAK);
        assert_eq!(vocab.min_reduce, 2);
        vocab.reduce_vocab();
        // threshold 2: 'c' (2) goes as well
        assert_eq!(vocab.search_char('c'), -1);
        assert!(vocab.search_char('a') > 0);
    }

    #[test]
    fn save_load_round_trip_preserves_counts_and_order() {
        let vocab = learn("aaabbc\naaab\n", 1);
        let f = tempfile::NamedTempFile::new().expect("create temp file");
        let path = f.path().to_string_lossy().into_owned();
        vocab.save_to_file(&path).expect("save vocab");

        let loaded = Vocabulary::load_from_file(&path, 1).expect("load vocab");
        assert_eq!(loaded.len(), vocab.len());
        for i in 0..vocab.len() {
            assert_eq!(loaded.entry(i).ch, vocab.entry(i).ch);
            assert_eq!(loaded.entry(i).cn, vocab.entry(i).cn);
        }
        assert_eq!(loaded.train_chars(), vocab.train_chars());
    }

    #[test]
    fn load_rejects_malformed_lines() {
        let mut f = tempfile::NamedTempFile::new().expect("create temp file");
        f.write_all(b"a notanumber\n").expect("write temp file");
        let res = Vocabulary::load_from_file(&f.path().to_string_lossy(), 1);
        assert!(res.is_err());
    }

    #[test]
    fn unigram_table_matches_the_powered_distribution() {
        // counts [_:0, a:100, b:10, c:1] on a scaled-down table
        let chars = vec![
            CharInfo::new(SENTENCE_BREAK, 0),
            CharInfo::new('a', 100),
            CharInfo::new('b', 10),
            CharInfo::new('c', 1),
        ];
        let table_size = 1_000_000;
        let table = build_unigram_table(&chars, table_size);

        assert_eq!(table[0], 1, "slot 0 belongs to the most frequent character");

        let z = 100f64.powf(0.75) + 10f64.powf(0.75) + 1.0;
        for (idx, cn) in [(1, 100i64), (2, 10), (3, 1)] {
            let got = table.iter().filter(|&&t| t == idx).count() as f64 / table_size as f64;
            let want = (cn as f64).powf(0.75) / z;
            assert!(
                (got - want).abs() < 1e-4,
                "index {idx}: got {got}, want {want}"
            );
        }
        let a_share = table.iter().filter(|&&t| t == 1).count() as f64 / table_size as f64;
        assert!(a_share >= 0.8);
    }

    #[test]
    fn sampling_never_returns_the_sentence_break() {
        let mut vocab = learn("aaaaabbbcc\n", 1);
        vocab.unigram_table = build_unigram_table(&vocab.chars, 10_000);
        for seed in 0..2000u64 {
            let target = vocab.sample_random_char(seed.wrapping_mul(2654435761));
            assert!(target > 0 && (target as usize) < vocab.len());
        }
    }
}
