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

use crate::vocab::CharInfo;

pub const MAX_CODE_LENGTH: usize = 40;

/// Stands in for an internal node that has not been created yet.
const COUNT_INFINITY: i64 = 1_000_000_000_000_000;

// Create a binary Huffman tree using the character counts. Frequent
// characters get short unique binary codes.
//
// Leaves occupy slots [0, V) of the working arrays and internal nodes fill
// [V, 2V-1) as they are created, so the two cheapest available nodes are
// always found at the two frontier pointers: `pos1` walking the leaves from
// least frequent to most frequent, `pos2` walking the internal nodes in
// creation order.
pub fn create_binary_tree(entries: &mut [CharInfo]) {
    let vocab_size = entries.len();
    if vocab_size < 2 {
        return;
    }
    log::debug!("building the Huffman tree over {vocab_size} leaves");

    let mut count = vec![0i64; vocab_size * 2 + 1];
    let mut binary = vec![0u8; vocab_size * 2 + 1];
    let mut parent_node = vec![0usize; vocab_size * 2 + 1];
    for (a, e) in entries.iter().enumerate() {
        count[a] = e.cn;
    }
    for c in count[vocab_size..vocab_size * 2].iter_mut() {
        *c = COUNT_INFINITY;
    }

    let mut pos1 = vocab_size as isize - 1;
    let mut pos2 = vocab_size;
    for a in 0..vocab_size - 1 {
        // find the two smallest available nodes 'min1, min2'
        let min1 = if pos1 >= 0 && count[pos1 as usize] < count[pos2] {
            pos1 -= 1;
            (pos1 + 1) as usize
        } else {
            pos2 += 1;
            pos2 - 1
        };
        let min2 = if pos1 >= 0 && count[pos1 as usize] < count[pos2] {
            pos1 -= 1;
            (pos1 + 1) as usize
        } else {
            pos2 += 1;
            pos2 - 1
        };
        count[vocab_size + a] = count[min1] + count[min2];
        parent_node[min1] = vocab_size + a;
        parent_node[min2] = vocab_size + a;
        binary[min2] = 1;
    }

    // Assign a code to each vocabulary entry by walking from its leaf to
    // the root, then reverse so index 0 is the topmost decision. The path
    // holds the internal nodes along the way as rows of the hierarchical
    // softmax output matrix (node - vocab_size), starting with the root.
    let root = vocab_size * 2 - 2;
    for a in 0..vocab_size {
        let mut code: Vec<u8> = Vec::new();
        let mut nodes: Vec<usize> = Vec::new();
        let mut b = a;
        loop {
            code.push(binary[b]);
            nodes.push(b);
            b = parent_node[b];
            if b == root {
                break;
            }
        }
        assert!(
            code.len() <= MAX_CODE_LENGTH,
            "Huffman code for {:?} is {} bits deep, the limit is {}",
            entries[a].ch,
            code.len(),
            MAX_CODE_LENGTH
        );

        let depth = code.len();
        let mut point: Vec<i32> = Vec::with_capacity(depth);
        point.push(vocab_size as i32 - 2);
        for i in (1..depth).rev() {
            point.push(nodes[i] as i32 - vocab_size as i32);
        }
        code.reverse();
        entries[a].code = code;
        entries[a].point = point;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries_from_counts(counts: &[(char, i64)]) -> Vec<CharInfo> {
        counts.iter().map(|&(ch, cn)| CharInfo::new(ch, cn)).collect()
    }

    fn coded(counts: &[(char, i64)]) -> Vec<CharInfo> {
        let mut entries = entries_from_counts(counts);
        create_binary_tree(&mut entries);
        entries
    }

    #[test]
    fn known_tree_shape() {
        // sentence break with count 0 at index 0, then descending counts
        let entries = coded(&[('\n', 0), ('e', 10), ('t', 7), ('a', 5), ('o', 3)]);
        let lengths: Vec<usize> = entries.iter().map(|e| e.code.len()).collect();
        assert_eq!(lengths, vec![2, 2, 2, 3, 3]);

        // the two shortest real codes belong to the two most frequent chars
        let shortest = entries[1..].iter().map(|e| e.code.len()).min().unwrap();
        assert_eq!(entries[1].code.len(), shortest);
        assert_eq!(entries[2].code.len(), shortest);
    }

    #[test]
    fn codes_are_prefix_free() {
        let entries = coded(&[
            ('\n', 2),
            ('e', 120),
            ('t', 90),
            ('a', 70),
            ('o', 61),
            ('i', 45),
            ('n', 30),
            ('s', 14),
            ('h', 9),
            ('r', 3),
            ('d', 1),
        ]);
        for (i, a) in entries.iter().enumerate() {
            assert!(!a.code.is_empty());
            for (j, b) in entries.iter().enumerate() {
                if i == j {
                    continue;
                }
                let is_prefix = a.code.len() <= b.code.len() && a.code[..] == b.code[..a.code.len()];
                assert!(!is_prefix, "code of entry {i} is a prefix of entry {j}");
            }
        }
    }

    #[test]
    fn codes_round_trip_through_a_decoder() {
        let entries = coded(&[
            ('\n', 1),
            ('e', 50),
            ('t', 20),
            ('a', 10),
            ('o', 5),
            ('i', 2),
        ]);

        // rebuild the tree as a trie keyed by code bits; prefix-freeness
        // means decoding a concatenated stream recovers the entry sequence
        let stream: Vec<u8> = entries.iter().flat_map(|e| e.code.iter().copied()).collect();
        let mut decoded = Vec::new();
        let mut pos = 0;
        while pos < stream.len() {
            let mut candidates: Vec<usize> = (0..entries.len()).collect();
            let mut depth = 0;
            loop {
                candidates.retain(|&c| {
                    entries[c].code.len() > depth && entries[c].code[depth] == stream[pos + depth]
                });
                depth += 1;
                if let [single] = candidates[..] {
                    if entries[single].code.len() == depth {
                        decoded.push(single);
                        pos += depth;
                        break;
                    }
                }
                assert!(!candidates.is_empty(), "dead end in the code trie");
            }
        }
        assert_eq!(decoded, (0..entries.len()).collect::<Vec<_>>());
    }

    #[test]
    fn code_lengths_stay_within_bounds() {
        // wildly skewed counts produce a deep, degenerate tree
        let counts: Vec<(char, i64)> = (0..30u32)
            .map(|i| (char::from_u32('a' as u32 + i).unwrap(), 1i64 << (29 - i)))
            .collect();
        let mut entries = entries_from_counts(&counts);
        entries.insert(0, CharInfo::new('\n', 0));
        create_binary_tree(&mut entries);
        for e in &entries {
            assert!(!e.code.is_empty());
            assert!(e.code.len() <= MAX_CODE_LENGTH);
            assert_eq!(e.code.len(), e.point.len());
        }
    }

    #[test]
    fn paths_address_internal_node_rows() {
        let entries = coded(&[('\n', 1), ('e', 9), ('t', 6), ('a', 4), ('o', 2)]);
        let vocab_size = entries.len() as i32;
        for e in &entries {
            assert_eq!(e.point[0], vocab_size - 2, "path starts at the root");
            for &p in &e.point {
                assert!(p >= 0 && p < vocab_size - 1);
            }
        }
    }

    #[test]
    fn degenerate_vocabulary_is_left_uncoded() {
        let mut entries = entries_from_counts(&[('\n', 0)]);
        create_binary_tree(&mut entries);
        assert!(entries[0].code.is_empty());
    }
}
