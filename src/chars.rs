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

use core::str;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

const READ_BUFFER_SIZE: usize = 8192;

/// Length of the UTF-8 sequence introduced by `byte`. Continuation and
/// invalid lead bytes report 1 so the decoder can resynchronize.
#[inline]
pub(crate) fn utf8_seq_len(byte: u8) -> usize {
    match byte {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    }
}

/// Iterator over the characters of a file, decoding UTF-8 incrementally.
///
/// Iteration may start at an arbitrary byte offset; a seek into the middle
/// of a multi-byte sequence yields U+FFFD for the truncated tail, as does
/// any byte that is not valid UTF-8.
pub struct FileCharIterator {
    file: File,
    start_pos: usize,
    end_pos: usize,
    read_buffer: Vec<u8>,
}

impl Iterator for FileCharIterator {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        self.read_char()
    }
}

impl FileCharIterator {
    /// Construct a FileCharIterator, iteration begins at byte `offset` in the file
    pub fn new(file_name: &str, offset: u64) -> std::io::Result<FileCharIterator> {
        let mut result = FileCharIterator {
            file: File::open(file_name)?,
            start_pos: 0,
            end_pos: 0,
            read_buffer: vec![0; READ_BUFFER_SIZE],
        };
        result.file.seek(SeekFrom::Start(offset))?;
        Ok(result)
    }

    /// Re-start iteration from the given offset
    pub fn reset(&mut self, offset: u64) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.start_pos = 0;
        self.end_pos = 0;
        Ok(())
    }

    /// Slide pending bytes to the front of the buffer and read more after
    /// them. Read errors mid-stream count as end of stream. Returns the
    /// number of buffered bytes.
    fn refill(&mut self) -> usize {
        if self.start_pos > 0 {
            self.read_buffer.copy_within(self.start_pos..self.end_pos, 0);
            self.end_pos -= self.start_pos;
            self.start_pos = 0;
        }
        let n = self.file.read(&mut self.read_buffer[self.end_pos..]).unwrap_or(0);
        self.end_pos += n;
        self.end_pos - self.start_pos
    }

    /// Read and return the next character from the file
    pub fn read_char(&mut self) -> Option<char> {
        let mut avail = self.end_pos - self.start_pos;
        if avail == 0 {
            avail = self.refill();
            if avail == 0 {
                return None;
            }
        }

        let need = utf8_seq_len(self.read_buffer[self.start_pos]);
        if avail < need {
            avail = self.refill();
        }

        let take = need.min(avail);
        match str::from_utf8(&self.read_buffer[self.start_pos..self.start_pos + take]) {
            Ok(s) => {
                self.start_pos += take;
                s.chars().next()
            }
            Err(_) => {
                // skip one byte and resynchronize on the next call
                self.start_pos += 1;
                Some(char::REPLACEMENT_CHARACTER)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file_with(content: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().expect("create temp file");
        f.write_all(content).expect("write temp file");
        f
    }

    fn path_of(f: &tempfile::NamedTempFile) -> String {
        f.path().to_string_lossy().into_owned()
    }

    #[test]
    fn reads_ascii_and_multibyte_chars() {
        let f = temp_file_with("héllo wörld\n".as_bytes());
        let it = FileCharIterator::new(&path_of(&f), 0).unwrap();
        let got: String = it.collect();
        assert_eq!(got, "héllo wörld\n");
    }

    #[test]
    fn multibyte_char_straddles_the_read_buffer() {
        let mut content = vec![b'a'; READ_BUFFER_SIZE - 1];
        content.extend_from_slice("é".as_bytes());
        content.push(b'b');
        let f = temp_file_with(&content);
        let got: Vec<char> = FileCharIterator::new(&path_of(&f), 0).unwrap().collect();
        assert_eq!(got.len(), READ_BUFFER_SIZE + 1);
        assert_eq!(got[READ_BUFFER_SIZE - 1], 'é');
        assert_eq!(got[READ_BUFFER_SIZE], 'b');
    }

    #[test]
    fn offset_into_a_sequence_yields_replacement() {
        let f = temp_file_with("aébc".as_bytes());
        // 'é' occupies bytes 1..3; start inside it
        let got: Vec<char> = FileCharIterator::new(&path_of(&f), 2).unwrap().collect();
        assert_eq!(got, vec![char::REPLACEMENT_CHARACTER, 'b', 'c']);
    }

    #[test]
    fn reset_restarts_iteration() {
        let f = temp_file_with(b"abc");
        let mut it = FileCharIterator::new(&path_of(&f), 0).unwrap();
        assert_eq!(it.read_char(), Some('a'));
        assert_eq!(it.read_char(), Some('b'));
        it.reset(0).unwrap();
        assert_eq!(it.read_char(), Some('a'));
        it.reset(2).unwrap();
        assert_eq!(it.read_char(), Some('c'));
        assert_eq!(it.read_char(), None);
    }

    #[test]
    fn truncated_sequence_at_eof() {
        // lead byte of a 3-byte sequence with only one continuation byte
        let f = temp_file_with(&[b'a', 0xe4, 0xb8]);
        let got: Vec<char> = FileCharIterator::new(&path_of(&f), 0).unwrap().collect();
        assert_eq!(got[0], 'a');
        assert!(got[1..].iter().all(|&c| c == char::REPLACEMENT_CHARACTER));
    }
}
