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

//! Generative sampler over a trained vector file: starting from a seed,
//! repeatedly average a random subset of the recent history, rank the
//! vocabulary by cosine similarity and draw the next character in
//! proportion to its similarity.

use std::io::{BufRead, Write};

use char2vec_rust::vectors::{CharVectors, normalize};
use rand::Rng;

/// number of closest characters a draw chooses between
const N_BEST: usize = 20;
/// how many recently emitted characters feed back into the context
const HISTORY_WINDOW: usize = 8;
/// probability that a history element contributes to the context
const SAMPLE: f64 = 0.5;
/// probability that the last emitted character is barred from the draw
const PENALTY: f64 = 0.5;
const OUTPUT_LENGTH: usize = 1000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let Some(file_name) = std::env::args().nth(1) else {
        eprintln!("Usage: char-writing <FILE>");
        eprintln!("where FILE contains character projections in the BINARY FORMAT");
        return Ok(());
    };

    let vectors = CharVectors::load(&file_name)?;
    eprintln!("characters: {}", vectors.vocab_size());
    eprintln!("size: {}", vectors.size());

    let mut rng = rand::thread_rng();
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("\nEnter character or character sequence (EXIT to break): ");
        std::io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let seed_text = line.trim_end_matches(['\n', '\r']);
        if seed_text == "EXIT" {
            break;
        }

        // seed characters missing from the vocabulary stay in the printed
        // text but contribute nothing to the context
        let seed: Vec<Option<usize>> = seed_text.chars().map(|ch| vectors.find(ch)).collect();
        print!("{seed_text}");
        std::io::stdout().flush()?;

        let mut history = [0usize; HISTORY_WINDOW];
        let mut history_len: usize = 0;
        let mut history_pos: usize = 0;
        let mut last_emitted: Option<usize> = None;
        let mut context = vec![0.0f64; vectors.size()];

        for _ in seed.len()..OUTPUT_LENGTH {
            context.fill(0.0);
            let known_seed = seed.iter().filter_map(|&idx| idx);
            for idx in known_seed.chain(history[..history_len].iter().copied()) {
                if rng.r#gen::<f64>() < SAMPLE {
                    for (c, v) in context.iter_mut().zip(vectors.row(idx)) {
                        *c += v;
                    }
                }
            }
            normalize(&mut context);

            let best = vectors.nearest(&context, N_BEST, -1.0, &[]);
            let banned = if rng.r#gen::<f64>() < PENALTY { last_emitted } else { None };
            // similarity-proportional draw; penalized and anti-correlated
            // candidates get no mass
            let weight = move |idx: usize, dist: f64| {
                if dist <= 0.0 || banned == Some(idx) {
                    0.0
                } else {
                    dist
                }
            };
            let total: f64 = best.iter().map(|&(idx, dist)| weight(idx, dist)).sum();
            if total <= 0.0 {
                // every candidate was dropped (empty context or penalty);
                // this step emits nothing
                continue;
            }

            let r = total * rng.r#gen::<f64>();
            let mut acc = 0.0;
            for &(idx, dist) in &best {
                acc += weight(idx, dist);
                if r < acc {
                    print!("{}", vectors.char_at(idx));
                    std::io::stdout().flush()?;
                    history[history_pos] = idx;
                    history_pos = (history_pos + 1) % HISTORY_WINDOW;
                    history_len = (history_len + 1).min(HISTORY_WINDOW);
                    last_emitted = Some(idx);
                    break;
                }
            }
        }
        println!();
    }
    Ok(())
}
