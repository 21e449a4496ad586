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

//! # char2vec
//!
//! Character-level vector embeddings in the word2vec family. The trainer
//! learns a fixed-dimensional vector for every distinct character of a
//! training corpus using the CBOW or skip-gram objective, with hierarchical
//! softmax and/or negative sampling. Training runs on several threads that
//! update the shared weight matrices without locks.
//!
//! The `char2vec` binary trains and serializes the vectors; the companion
//! binaries `char-analogy` and `char-writing` consume the binary vector
//! files it produces.

pub mod chars;
pub mod huffman;
pub mod kmeans;
pub mod nnet;
pub mod vectors;
pub mod vocab;

/// Errors surfaced by vocabulary and vector file handling.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid vocabulary file: {0}")]
    InvalidVocab(String),
    #[error("invalid vector file: {0}")]
    InvalidVectors(String),
}
