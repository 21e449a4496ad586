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

use std::fs::File;
use std::io::{BufWriter, Write};
use std::ptr::slice_from_raw_parts_mut;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::chars::FileCharIterator;
use crate::kmeans;
use crate::vocab::{CharInfo, Vocabulary};

pub const EXP_TABLE_SIZE: usize = 1000;
pub const MAX_EXP: f64 = 6.0;
const MAX_SENTENCE_LENGTH: usize = 1000;

pub struct TrainParams {
    pub training_file: String,
    pub training_file_size: u64,
    pub layer1_size: usize,
    pub window: usize,         // the train window parameter
    pub total_iter: u64,       // number of training epochs
    pub cbow: bool,            // CBOW when set, skip-gram otherwise
    pub hs: bool,              // hierarchical softmax
    pub negative_samples: i32, // number of negative samples, 0 disables
    pub sample: f64,           // subsampling threshold, 0 disables
    pub num_threads: usize,    // the total number of training threads
    pub starting_alpha: f64,   // the starting learning rate
    pub debug_mode: i32,
}

/// Shared training state mutated while workers run: the global progress
/// counter and the decayed learning rate, both relaxed atomics.
pub struct TrainProgress {
    pub char_count_actual: AtomicU64,
    alpha: AtomicU64,
}

impl TrainProgress {
    pub fn new(starting_alpha: f64) -> TrainProgress {
        TrainProgress {
            char_count_actual: AtomicU64::new(0),
            alpha: AtomicU64::new(starting_alpha.to_bits()),
        }
    }

    pub fn alpha(&self) -> f64 {
        f64::from_bits(self.alpha.load(Ordering::Relaxed))
    }

    fn set_alpha(&self, alpha: f64) {
        self.alpha.store(alpha.to_bits(), Ordering::Relaxed);
    }
}

/// Precomputed logistic function, quantized over (-MAX_EXP, MAX_EXP).
pub struct ExpTable {
    table: Vec<f64>,
}

impl ExpTable {
    pub fn new() -> ExpTable {
        let mut table = Vec::with_capacity(EXP_TABLE_SIZE + 1);
        for i in 0..=EXP_TABLE_SIZE {
            let x = (i as f64 / EXP_TABLE_SIZE as f64 * 2.0 - 1.0) * MAX_EXP;
            let expx = f64::exp(x);
            table.push(expx / (expx + 1.0));
        }
        ExpTable { table }
    }

    /// σ(f) for f in (-MAX_EXP, MAX_EXP); callers clamp or skip outside.
    #[inline]
    pub fn sigmoid(&self, f: f64) -> f64 {
        self.table[((f + MAX_EXP) * (EXP_TABLE_SIZE as f64 / MAX_EXP / 2.0)) as usize]
    }
}

impl Default for ExpTable {
    fn default() -> Self {
        ExpTable::new()
    }
}

pub(crate) struct LcRandomGen {
    state: u64,
}

impl LcRandomGen {
    pub(crate) fn new(seed: u64) -> LcRandomGen {
        LcRandomGen { state: seed }
    }

    pub(crate) fn next_rand(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(25214903917).wrapping_add(11);
        self.state
    }
}

pub struct NeuralNet {
    vocab_size: usize,
    layer1_size: usize,
    syn0: Vec<f64>,
    syn1: Vec<f64>,    // hierarchical softmax output weights, empty when hs is off
    syn1neg: Vec<f64>, // negative sampling output weights, empty when negative is 0
}

impl NeuralNet {
    pub fn new(vocab_size: usize, layer1_size: usize, hs: bool, negative: bool) -> NeuralNet {
        let size = vocab_size * layer1_size;
        let mut net = NeuralNet {
            vocab_size,
            layer1_size,
            syn0: Vec::with_capacity(size),
            syn1: Vec::new(),
            syn1neg: Vec::new(),
        };

        let mut lc_rand = LcRandomGen::new(1);
        let rand_gen =
            || (((lc_rand.next_rand() & 0xffff) as f64 / 65536.0) - 0.5) / layer1_size as f64;
        net.syn0.resize_with(size, rand_gen);
        if hs {
            net.syn1.resize(size, 0.0);
        }
        if negative {
            net.syn1neg.resize(size, 0.0);
        }
        net
    }

    pub fn layer1_size(&self) -> usize {
        self.layer1_size
    }

    pub fn syn0(&self) -> &[f64] {
        &self.syn0
    }

    #[inline]
    fn syn0_row(&self, idx: usize) -> &[f64] {
        row(&self.syn0, idx, self.layer1_size)
    }

    /// Save the learned character vectors in the interchange format: a
    /// `<vocab_size> <layer1_size>` header line, then one row per entry
    /// holding the character, a space and the vector as little-endian f64
    /// (binary mode) or six-decimal text.
    pub fn save_vectors(
        &self,
        vocab: &Vocabulary,
        output_file_name: &str,
        binary: bool,
    ) -> Result<(), std::io::Error> {
        let mut buf_writer: BufWriter<File> = BufWriter::new(File::create(output_file_name)?);
        writeln!(buf_writer, "{} {}", self.vocab_size, self.layer1_size)?;
        for (idx, entry) in vocab.entries().enumerate() {
            write!(buf_writer, "{} ", entry.ch)?;
            let char_vec = &self.syn0[idx * self.layer1_size..(idx + 1) * self.layer1_size];
            if binary {
                for f in char_vec {
                    buf_writer.write_all(&f.to_le_bytes())?;
                }
            } else {
                for f in char_vec {
                    write!(buf_writer, "{f:.06} ")?;
                }
            }
            writeln!(buf_writer)?;
        }

        Ok(())
    }

    /// Cluster the learned vectors and save one `<character> <cluster>`
    /// line per entry instead of the vectors themselves.
    pub fn save_classes(
        &self,
        vocab: &Vocabulary,
        output_file_name: &str,
        classes: usize,
    ) -> Result<(), std::io::Error> {
        let cl = kmeans::cluster(&self.syn0, self.vocab_size, self.layer1_size, classes);
        let mut buf_writer: BufWriter<File> = BufWriter::new(File::create(output_file_name)?);
        for (idx, entry) in vocab.entries().enumerate() {
            writeln!(buf_writer, "{} {}", entry.ch, cl[idx])?;
        }
        Ok(())
    }
}

/// @return the dot product of 2 f64 vectors
fn dot_product(vec1: &[f64], vec2: &[f64]) -> f64 {
    debug_assert!(vec1.len() == vec2.len());
    vec1.iter()
        .zip(vec2)
        .fold(0.0, |acc, cur| acc + cur.0 * cur.1)
}

/// y <- a * x + y, named after Fortran's axpy
fn axpy(a: f64, x: &[f64], y: &mut [f64]) {
    x.iter()
        .zip(y.iter_mut())
        .for_each(|(src, dest)| *dest += a * src);
}

/// y <- a * x + y where `y` aliases a row of a shared weight matrix.
///
/// Stores are plain f64 writes; concurrent workers may interleave on the
/// same row and lose updates, which HogWild-style SGD tolerates. Each store
/// is a single machine-word write, so no mid-float tearing can occur. Do
/// not serialize these updates with a lock.
#[inline]
fn axpy_shared(a: f64, x: &[f64], y: &[f64]) {
    unsafe {
        let dest = slice_from_raw_parts_mut(y.as_ptr().cast_mut(), y.len());
        for (i, src) in x.iter().enumerate() {
            (*dest)[i] += a * src;
        }
    }
}

#[inline]
fn row(matrix: &[f64], idx: usize, layer1_size: usize) -> &[f64] {
    unsafe { matrix.get_unchecked(idx * layer1_size..(idx + 1) * layer1_size) }
}

/// Keep score for the subsampling of frequent characters: characters are
/// kept when the score is at least a uniform [0,1) draw, so the score
/// decreases as the count grows while the frequency ranking is preserved.
pub(crate) fn subsample_keep_score(cn: i64, sample: f64, train_chars: u64) -> f64 {
    let threshold = sample * train_chars as f64;
    ((cn as f64 / threshold).sqrt() + 1.0) * threshold / cn as f64
}

/// Walk the Huffman path of `entry`, treating each internal node as a
/// binary classifier over the activation `h`. The input-side gradient
/// accumulates into `err`; node weights are updated in place.
fn hierarchical_softmax(
    net: &NeuralNet,
    entry: &CharInfo,
    h: &[f64],
    err: &mut [f64],
    alpha: f64,
    exp_table: &ExpTable,
) {
    for d in 0..entry.code.len() {
        let node_weights = row(&net.syn1, entry.point[d] as usize, net.layer1_size);
        // Propagate hidden -> output
        let f = dot_product(h, node_weights);
        if f <= -MAX_EXP || f >= MAX_EXP {
            continue;
        }
        // 'g' is the gradient multiplied by the learning rate
        let g = (1.0 - entry.code[d] as f64 - exp_table.sigmoid(f)) * alpha;
        // Propagate errors output -> hidden
        axpy(g, node_weights, err);
        // Learn weights hidden -> output
        axpy_shared(g, h, node_weights);
    }
}

/// One positive pass against `center` and `negative` passes against
/// characters drawn from the unigram table. The input-side gradient
/// accumulates into `err`; target weights are updated in place.
#[allow(clippy::too_many_arguments)]
fn negative_sampling(
    net: &NeuralNet,
    vocab: &Vocabulary,
    center: i32,
    h: &[f64],
    err: &mut [f64],
    alpha: f64,
    exp_table: &ExpTable,
    negative: i32,
    rand_gen: &mut LcRandomGen,
) {
    for d in 0..negative + 1 {
        let target: i32;
        let label: f64;

        if d == 0 {
            target = center;
            label = 1.0;
        } else {
            target = vocab.sample_random_char(rand_gen.next_rand());
            // Don't use the positive sample as a negative sample!
            if target == center {
                continue;
            }
            if target < 0 || target as usize >= net.vocab_size {
                continue;
            }
            label = 0.0;
        }

        let target_weights = row(&net.syn1neg, target as usize, net.layer1_size);
        let f = dot_product(h, target_weights);
        // the gradient saturates outside the exp table's domain
        let g = if f > MAX_EXP {
            (label - 1.0) * alpha
        } else if f < -MAX_EXP {
            label * alpha
        } else {
            (label - exp_table.sigmoid(f)) * alpha
        };
        axpy(g, target_weights, err);
        axpy_shared(g, h, target_weights);
    }
}

/// train the char2vec neural net `net` with training data found in `params.training_file`
pub fn train_model_thread(
    net: Arc<NeuralNet>,
    vocab: &Vocabulary,
    exp_table: &ExpTable,
    thread_id: usize,
    params: &TrainParams,
    progress: &TrainProgress,
) -> Result<(), std::io::Error> {
    assert!(net.vocab_size == vocab.len());
    assert!(net.vocab_size * net.layer1_size == net.syn0.len());
    assert!(!params.hs || net.syn1.len() == net.syn0.len());
    assert!(params.negative_samples <= 0 || net.syn1neg.len() == net.syn0.len());

    let offset = params.training_file_size / params.num_threads as u64 * thread_id as u64;
    let mut fi = FileCharIterator::new(&params.training_file, offset)?;
    let mut eof_reached: bool = false;
    let layer1_size = net.layer1_size;
    let train_chars = vocab.train_chars();

    let mut neu1: Vec<f64> = vec![0.0; layer1_size];
    let mut neu1e: Vec<f64> = vec![0.0; layer1_size];

    let mut rand_gen = LcRandomGen::new(thread_id as u64);
    // progress tracking
    let mut char_count: u64 = 0;
    let mut last_char_count: u64 = 0;
    let start: Instant = Instant::now();

    let mut sen = [-1i32; MAX_SENTENCE_LENGTH + 1];
    let mut sentence_length: usize = 0;
    let mut sentence_position: usize = 0;
    let mut local_iter = params.total_iter;

    'thread_loop: loop {
        // This block publishes this worker's progress, prints an update and
        // decays the shared learning rate.
        if char_count - last_char_count > 10000 {
            progress
                .char_count_actual
                .fetch_add(char_count - last_char_count, Ordering::Relaxed);
            last_char_count = char_count;

            let wc = progress.char_count_actual.load(Ordering::Relaxed) as f64;
            let denom = (params.total_iter * train_chars + 1) as f64;

            // The percentage complete is based on the total number of passes
            // we are doing and not just the current pass.
            if params.debug_mode > 1 {
                eprint!(
                    "\rAlpha: {:.06}  Progress: {:.02}%  Chars/sec: {:.02}k  ",
                    progress.alpha(),
                    wc / denom * 100_f64,
                    (wc / 1000_f64) / start.elapsed().as_secs_f64()
                );
                std::io::stderr().flush().unwrap_or_default();
            }

            // Decay alpha to [initial alpha] * [fraction of training left],
            // floored at [initial alpha] * 0.0001.
            let mut alpha = params.starting_alpha * (1_f64 - wc / denom);
            if alpha < params.starting_alpha * 0.0001 {
                alpha = params.starting_alpha * 0.0001;
            }
            progress.set_alpha(alpha);
        }

        // Retrieve the next sentence from the training data and store it in `sen`
        if sentence_length == 0 {
            loop {
                let Some(ch) = fi.read_char() else {
                    eof_reached = true;
                    break;
                };
                let idx = vocab.search_char(ch);
                if idx < 0 {
                    // out-of-vocabulary characters are not training events
                    continue;
                }
                char_count += 1;

                // index 0 is the sentence break
                if idx == 0 {
                    // an empty sentence, or one consisting only of
                    // out-of-vocabulary characters
                    if sentence_length == 0 {
                        continue;
                    }
                    break;
                }

                // The subsampling randomly discards frequent characters
                // while keeping the ranking the same. Discarded characters
                // still count as consumed.
                if params.sample > 0.0 {
                    let ran =
                        subsample_keep_score(vocab.entry(idx as usize).cn, params.sample, train_chars);
                    if ran < (rand_gen.next_rand() & 0xffff) as f64 / 65536.0 {
                        continue;
                    }
                }

                sen[sentence_length] = idx;
                sentence_length += 1;
                if sentence_length >= MAX_SENTENCE_LENGTH {
                    break;
                }
            }
            sentence_position = 0;
        }

        if (sentence_length == 0 && eof_reached)
            || (char_count > train_chars / params.num_threads as u64)
        {
            // flush the tail below the publication batch size so the final
            // counter is exact
            progress
                .char_count_actual
                .fetch_add(char_count - last_char_count, Ordering::Relaxed);
            local_iter -= 1;
            if local_iter == 0 {
                break 'thread_loop;
            }
            char_count = 0;
            last_char_count = 0;
            sentence_length = 0;
            fi.reset(offset)?;
            eof_reached = false;
            continue 'thread_loop;
        }

        let center = sen[sentence_position];
        // assertion taken care of when filling the sentence
        debug_assert!(center > 0 && (center as usize) < net.vocab_size);
        let center_entry = vocab.entry(center as usize);

        let alpha = progress.alpha();
        // random window shrink: the effective context is `window - b` wide
        let b = (rand_gen.next_rand() % params.window as u64) as usize;

        if params.cbow {
            // in -> hidden: average the context character vectors into neu1
            neu1.fill(0.0);
            // `cw` stores the context character count
            let mut cw = 0;
            for a in b..params.window * 2 + 1 - b {
                if a == params.window {
                    continue;
                }
                let c: isize = sentence_position as isize - params.window as isize + a as isize;
                if c < 0 || c >= sentence_length as isize {
                    continue;
                }
                let context = sen[c as usize] as usize;
                axpy(1.0, net.syn0_row(context), &mut neu1);
                cw += 1;
            }

            if cw > 0 {
                for n in &mut neu1 {
                    *n /= cw as f64;
                }
                neu1e.fill(0.0);

                if params.hs {
                    hierarchical_softmax(&net, center_entry, &neu1, &mut neu1e, alpha, exp_table);
                }
                if params.negative_samples > 0 {
                    negative_sampling(
                        &net,
                        vocab,
                        center,
                        &neu1,
                        &mut neu1e,
                        alpha,
                        exp_table,
                        params.negative_samples,
                        &mut rand_gen,
                    );
                }

                // hidden -> in: backpropagate the accumulated error to every
                // context character vector
                for a in b..params.window * 2 + 1 - b {
                    if a == params.window {
                        continue;
                    }
                    let c: isize =
                        sentence_position as isize - params.window as isize + a as isize;
                    if c < 0 || c >= sentence_length as isize {
                        continue;
                    }
                    let context = sen[c as usize] as usize;
                    axpy_shared(1.0, &neu1e, net.syn0_row(context));
                }
            }
        } else {
            // train skip-gram: each context character's vector is the input
            // and is updated independently
            for a in b..params.window * 2 + 1 - b {
                if a == params.window {
                    continue;
                }
                let c: isize = sentence_position as isize - params.window as isize + a as isize;
                if c < 0 || c >= sentence_length as isize {
                    continue;
                }
                let context = sen[c as usize] as usize;
                let context_vec = net.syn0_row(context);
                neu1e.fill(0.0);

                if params.hs {
                    hierarchical_softmax(&net, center_entry, context_vec, &mut neu1e, alpha, exp_table);
                }
                if params.negative_samples > 0 {
                    negative_sampling(
                        &net,
                        vocab,
                        center,
                        context_vec,
                        &mut neu1e,
                        alpha,
                        exp_table,
                        params.negative_samples,
                        &mut rand_gen,
                    );
                }

                // Learn weights input -> hidden
                axpy_shared(1.0, &neu1e, context_vec);
            }
        }

        // Advance to the next character in the sentence; past the end, read
        // a new sentence at the top of the loop.
        sentence_position += 1;
        if sentence_position >= sentence_length {
            sentence_length = 0;
            continue;
        }
    }

    Ok(())
}
