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

use crate::Error;
use crate::chars::utf8_seq_len;

/// Character vectors read back from a binary vector file, with every row
/// L2-normalized so dot products are cosine similarities.
pub struct CharVectors {
    chars: Vec<char>,
    m: Vec<f64>,
    size: usize,
}

/// Scale `vec` to unit L2 norm; a zero vector is left unchanged.
pub fn normalize(vec: &mut [f64]) {
    let length = vec.iter().fold(0.0f64, |acc, v| acc + v * v).sqrt();
    if length != 0.0 {
        for v in vec.iter_mut() {
            *v /= length;
        }
    }
}

impl CharVectors {
    /// Read a binary-mode vector file: a `<vocab_size> <size>` header line,
    /// then one row per character holding its UTF-8 bytes, a space, `size`
    /// little-endian f64 values and a newline.
    pub fn load(file_name: &str) -> Result<CharVectors, Error> {
        let data = std::fs::read(file_name)?;
        let mut pos = 0usize;

        let vocab_size = read_decimal(&data, &mut pos)?;
        expect_byte(&data, &mut pos, b' ')?;
        let size = read_decimal(&data, &mut pos)?;
        expect_byte(&data, &mut pos, b'\n')?;
        if vocab_size == 0 || size == 0 {
            return Err(Error::InvalidVectors("empty matrix".to_string()));
        }

        let mut chars = Vec::with_capacity(vocab_size);
        let mut m = vec![0.0f64; vocab_size * size];
        for b in 0..vocab_size {
            chars.push(read_char(&data, &mut pos)?);
            expect_byte(&data, &mut pos, b' ')?;
            let row = &mut m[b * size..(b + 1) * size];
            for v in row.iter_mut() {
                let chunk = data
                    .get(pos..pos + 8)
                    .ok_or_else(|| Error::InvalidVectors("truncated row".to_string()))?;
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                *v = f64::from_le_bytes(bytes);
                pos += 8;
            }
            expect_byte(&data, &mut pos, b'\n')?;
            normalize(row);
        }

        Ok(CharVectors { chars, m, size })
    }

    pub fn vocab_size(&self) -> usize {
        self.chars.len()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn char_at(&self, idx: usize) -> char {
        self.chars[idx]
    }

    /// Vocabulary position of `ch`; `None` when the character is unknown.
    pub fn find(&self, ch: char) -> Option<usize> {
        self.chars.iter().position(|&c| c == ch)
    }

    pub fn row(&self, idx: usize) -> &[f64] {
        &self.m[idx * self.size..(idx + 1) * self.size]
    }

    /// The up-to-`n` rows most similar to `vec` by dot product, best first.
    /// Only similarities above `floor` qualify; `exclude` lists vocabulary
    /// positions to skip. Ties keep the lower vocabulary position first, so
    /// the ranking is deterministic.
    pub fn nearest(&self, vec: &[f64], n: usize, floor: f64, exclude: &[usize]) -> Vec<(usize, f64)> {
        let mut best: Vec<(usize, f64)> = Vec::new();
        for c in 0..self.chars.len() {
            if exclude.contains(&c) {
                continue;
            }
            let dist = self
                .row(c)
                .iter()
                .zip(vec)
                .fold(0.0, |acc, cur| acc + cur.0 * cur.1);
            if dist > floor {
                best.push((c, dist));
            }
        }
        best.sort_by(|a, b| b.1.total_cmp(&a.1));
        best.truncate(n);
        best
    }
}

fn read_decimal(data: &[u8], pos: &mut usize) -> Result<usize, Error> {
    let start = *pos;
    while *pos < data.len() && data[*pos].is_ascii_digit() {
        *pos += 1;
    }
    if *pos == start {
        return Err(Error::InvalidVectors("expected a decimal integer".to_string()));
    }
    let text = str::from_utf8(&data[start..*pos])
        .map_err(|_| Error::InvalidVectors("expected a decimal integer".to_string()))?;
    text.parse()
        .map_err(|_| Error::InvalidVectors(format!("integer {text:?} out of range")))
}

fn expect_byte(data: &[u8], pos: &mut usize, want: u8) -> Result<(), Error> {
    match data.get(*pos) {
        Some(&b) if b == want => {
            *pos += 1;
            Ok(())
        }
        Some(&b) => Err(Error::InvalidVectors(format!(
            "expected byte {want:#04x} at offset {pos}, found {b:#04x}"
        ))),
        None => Err(Error::InvalidVectors("unexpected end of file".to_string())),
    }
}

fn read_char(data: &[u8], pos: &mut usize) -> Result<char, Error> {
    let first = *data
        .get(*pos)
        .ok_or_else(|| Error::InvalidVectors("unexpected end of file".to_string()))?;
    let len = utf8_seq_len(first);
    let bytes = data
        .get(*pos..*pos + len)
        .ok_or_else(|| Error::InvalidVectors("truncated character".to_string()))?;
    let s = str::from_utf8(bytes)
        .map_err(|_| Error::InvalidVectors(format!("invalid UTF-8 at offset {pos}")))?;
    *pos += len;
    s.chars()
        .next()
        .ok_or_else(|| Error::InvalidVectors("empty character".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_vector_file(rows: &[(char, Vec<f64>)]) -> tempfile::NamedTempFile {
        let size = rows[0].1.len();
        let mut data: Vec<u8> = Vec::new();
        data.extend_from_slice(format!("{} {}\n", rows.len(), size).as_bytes());
        for (ch, vec) in rows {
            let mut buf = [0u8; 4];
            data.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            data.push(b' ');
            for v in vec {
                data.extend_from_slice(&v.to_le_bytes());
            }
            data.push(b'\n');
        }
        let mut f = tempfile::NamedTempFile::new().expect("create temp file");
        f.write_all(&data).expect("write temp file");
        f
    }

    fn one_hot(dim: usize, size: usize) -> Vec<f64> {
        let mut v = vec![0.0; size];
        v[dim] = 1.0;
        v
    }

    #[test]
    fn loads_and_normalizes_rows() {
        let f = write_vector_file(&[('\n', vec![3.0, 4.0, 0.0]), ('a', vec![0.0, 0.0, 2.0])]);
        let vectors = CharVectors::load(&f.path().to_string_lossy()).expect("load");
        assert_eq!(vectors.vocab_size(), 2);
        assert_eq!(vectors.size(), 3);
        for idx in 0..vectors.vocab_size() {
            let sq: f64 = vectors.row(idx).iter().map(|v| v * v).sum();
            assert!((sq - 1.0).abs() < 1e-10);
        }
        assert_eq!(vectors.row(0), &[0.6, 0.8, 0.0]);
    }

    #[test]
    fn find_reports_missing_chars_explicitly() {
        let f = write_vector_file(&[('\n', vec![1.0, 0.0]), ('a', vec![0.0, 1.0])]);
        let vectors = CharVectors::load(&f.path().to_string_lossy()).expect("load");
        assert_eq!(vectors.find('a'), Some(1));
        assert_eq!(vectors.find('\n'), Some(0));
        assert_eq!(vectors.find('z'), None);
    }

    #[test]
    fn rejects_truncated_files() {
        let f = write_vector_file(&[('a', vec![1.0, 0.0])]);
        let data = std::fs::read(f.path()).expect("read");
        let mut g = tempfile::NamedTempFile::new().expect("create temp file");
        g.write_all(&data[..data.len() - 5]).expect("write");
        assert!(CharVectors::load(&g.path().to_string_lossy()).is_err());
    }

    #[test]
    fn analogy_on_one_hot_vectors_is_deterministic() {
        // orthonormal one-hots: b - a + c is orthogonal to every remaining
        // row, so nothing clears the similarity floor; the result must be
        // empty and identical across runs
        let size = 5;
        let rows: Vec<(char, Vec<f64>)> = ['\n', 'a', 'b', 'c', 'd']
            .iter()
            .enumerate()
            .map(|(i, &ch)| (ch, one_hot(i, size)))
            .collect();
        let f = write_vector_file(&rows);
        let path = f.path().to_string_lossy().into_owned();

        let mut outputs = Vec::new();
        for _ in 0..2 {
            let vectors = CharVectors::load(&path).expect("load");
            let (a, b, c) = (
                vectors.find('a').unwrap(),
                vectors.find('b').unwrap(),
                vectors.find('c').unwrap(),
            );
            let mut query = vec![0.0; size];
            for i in 0..size {
                query[i] = vectors.row(b)[i] - vectors.row(a)[i] + vectors.row(c)[i];
            }
            normalize(&mut query);
            outputs.push(vectors.nearest(&query, 40, 0.0, &[a, b, c]));
        }
        assert_eq!(outputs[0], outputs[1]);
        assert!(outputs[0].is_empty());
    }

    #[test]
    fn analogy_finds_the_constructed_answer() {
        // craft 'd' to sit exactly at b - a + c
        let size = 4;
        let mut d = vec![0.0; size];
        d[1] = -1.0; // -a
        d[2] = 1.0; // +b
        d[3] = 1.0; // +c
        normalize(&mut d);
        let rows = vec![
            ('\n', one_hot(0, size)),
            ('a', one_hot(1, size)),
            ('b', one_hot(2, size)),
            ('c', one_hot(3, size)),
            ('d', d),
        ];
        let f = write_vector_file(&rows);
        let vectors = CharVectors::load(&f.path().to_string_lossy()).expect("load");

        let mut query = vec![0.0; size];
        for i in 0..size {
            query[i] = vectors.row(2)[i] - vectors.row(1)[i] + vectors.row(3)[i];
        }
        normalize(&mut query);
        let best = vectors.nearest(&query, 40, 0.0, &[1, 2, 3]);
        assert_eq!(best[0].0, 4);
        assert_eq!(vectors.char_at(best[0].0), 'd');
    }

    #[test]
    fn nearest_respects_floor_count_and_exclusions() {
        let rows = vec![
            ('\n', vec![1.0, 0.0]),
            ('a', vec![0.9, 0.1]),
            ('b', vec![0.5, 0.5]),
            ('c', vec![-1.0, 0.0]),
        ];
        let f = write_vector_file(&rows);
        let vectors = CharVectors::load(&f.path().to_string_lossy()).expect("load");

        let query = vec![1.0, 0.0];
        let best = vectors.nearest(&query, 2, 0.0, &[0]);
        assert_eq!(best.len(), 2);
        assert_eq!(best[0].0, 1);
        assert_eq!(best[1].0, 2);
        assert!(best[0].1 >= best[1].1);

        // 'c' points the other way and never clears a floor of 0
        let all = vectors.nearest(&query, 10, 0.0, &[]);
        assert!(all.iter().all(|&(idx, _)| idx != 3));
    }
}
