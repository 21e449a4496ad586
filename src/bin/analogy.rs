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

//! Character analogy queries against a trained vector file: for characters
//! A, B, C, rank the vocabulary by cosine similarity to B - A + C.

use std::io::{BufRead, Write};

use char2vec_rust::vectors::{CharVectors, normalize};

/// number of closest characters that will be shown
const N_BEST: usize = 40;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let Some(file_name) = std::env::args().nth(1) else {
        eprintln!("Usage: char-analogy <FILE>");
        eprintln!("where FILE contains character projections in the BINARY FORMAT");
        return Ok(());
    };

    let vectors = CharVectors::load(&file_name)?;
    eprintln!("characters: {}", vectors.vocab_size());
    eprintln!("size: {}", vectors.size());

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("Enter three characters (EXIT to break): ");
        std::io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim_end_matches(['\n', '\r']);
        if query == "EXIT" {
            break;
        }

        let mut indices: Vec<usize> = Vec::new();
        let mut missing = false;
        for ch in query.chars() {
            match vectors.find(ch) {
                Some(idx) => {
                    println!("Character: {ch}  Position in vocabulary: {idx}");
                    indices.push(idx);
                }
                None => {
                    println!("Out of dictionary character: {ch}");
                    missing = true;
                    break;
                }
            }
        }
        if missing {
            continue;
        }
        if indices.len() < 3 {
            println!(
                "Only {} characters were entered.. three characters are needed at the input to perform the calculation",
                indices.len()
            );
            continue;
        }

        let (a, b, c) = (indices[0], indices[1], indices[2]);
        let mut query_vec = vec![0.0f64; vectors.size()];
        for i in 0..vectors.size() {
            query_vec[i] = vectors.row(b)[i] - vectors.row(a)[i] + vectors.row(c)[i];
        }
        normalize(&mut query_vec);

        println!("\n      Character         Distance");
        println!("------------------------------------------------------------------------");
        for (idx, dist) in vectors.nearest(&query_vec, N_BEST, 0.0, &indices) {
            println!("{:>10}\t\t{dist:.6}", vectors.char_at(idx));
        }
    }
    Ok(())
}
