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

use std::fs::metadata;
use std::sync::Arc;
use std::thread;

use char2vec_rust::nnet::{ExpTable, NeuralNet, TrainParams, TrainProgress, train_model_thread};
use char2vec_rust::vocab::Vocabulary;

struct Config {
    train_file: String,
    output_file: String,
    save_vocab_file: String,
    read_vocab_file: String,
    size: usize,
    window: usize,
    sample: f64,
    hs: bool,
    negative: i32,
    threads: usize,
    iter: u64,
    min_count: i64,
    alpha: Option<f64>,
    classes: usize,
    debug_mode: i32,
    binary: bool,
    cbow: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            train_file: String::new(),
            output_file: String::new(),
            save_vocab_file: String::new(),
            read_vocab_file: String::new(),
            size: 100,
            window: 5,
            sample: 1e-3,
            hs: false,
            negative: 5,
            threads: 12,
            iter: 5,
            min_count: 5,
            alpha: None,
            classes: 0,
            debug_mode: 2,
            binary: false,
            cbow: true,
        }
    }
}

fn config_error(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> String {
    match args.next() {
        Some(value) => value,
        None => config_error(&format!("No value specified for parameter {flag}.")),
    }
}

fn next_parsed<T: std::str::FromStr>(args: &mut impl Iterator<Item = String>, flag: &str) -> T {
    match next_value(args, flag).parse() {
        Ok(value) => value,
        Err(_) => config_error(&format!("No valid value specified for parameter {flag}.")),
    }
}

fn print_usage() {
    eprintln!("char2vec: character vector estimation");
    eprintln!("usage: char2vec -train <file> -output <file> [options]");
    eprintln!("options: -size <int> -window <int> -sample <float> -hs <int>");
    eprintln!("         -negative <int> -threads <int> -iter <int> -min-count <int>");
    eprintln!("         -alpha <float> -classes <int> -debug <int> -binary <int>");
    eprintln!("         -save-vocab <file> -read-vocab <file> -cbow <int>");
}

fn parse_args() -> Config {
    let mut cfg = Config::default();
    let mut args = std::env::args().skip(1).peekable();
    if args.peek().is_none() {
        print_usage();
        std::process::exit(0);
    }

    while let Some(arg) = args.next() {
        match &arg[..] {
            "-train" | "--train" => cfg.train_file = next_value(&mut args, &arg),
            "-output" | "--output" => cfg.output_file = next_value(&mut args, &arg),
            "-save-vocab" | "--save-vocab" => cfg.save_vocab_file = next_value(&mut args, &arg),
            "-read-vocab" | "--read-vocab" => cfg.read_vocab_file = next_value(&mut args, &arg),
            "-size" | "--size" => cfg.size = next_parsed(&mut args, &arg),
            "-window" | "--window" => cfg.window = next_parsed(&mut args, &arg),
            "-sample" | "--sample" => cfg.sample = next_parsed(&mut args, &arg),
            "-hs" | "--hs" => cfg.hs = next_parsed::<i32>(&mut args, &arg) != 0,
            "-negative" | "--negative" => cfg.negative = next_parsed(&mut args, &arg),
            "-threads" | "--threads" => cfg.threads = next_parsed(&mut args, &arg),
            "-iter" | "--iter" => cfg.iter = next_parsed(&mut args, &arg),
            "-min-count" | "--min-count" => cfg.min_count = next_parsed(&mut args, &arg),
            "-alpha" | "--alpha" => cfg.alpha = Some(next_parsed(&mut args, &arg)),
            "-classes" | "--classes" => cfg.classes = next_parsed(&mut args, &arg),
            "-debug" | "--debug" => cfg.debug_mode = next_parsed(&mut args, &arg),
            "-binary" | "--binary" => cfg.binary = next_parsed::<i32>(&mut args, &arg) != 0,
            "-cbow" | "--cbow" => cfg.cbow = next_parsed::<i32>(&mut args, &arg) != 0,
            _ => config_error(&format!("Unknown argument {arg}")),
        }
    }

    if cfg.train_file.is_empty() {
        config_error("No value specified for parameter -train.");
    }
    if cfg.size == 0 || cfg.window == 0 || cfg.threads == 0 || cfg.iter == 0 {
        config_error("-size, -window, -threads and -iter must be positive.");
    }
    if cfg.negative < 0 {
        config_error("-negative must not be negative.");
    }
    cfg
}

fn train(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let training_file_size = metadata(&cfg.train_file)?.len();
    let mut vocab: Vocabulary = if cfg.read_vocab_file.is_empty() {
        Vocabulary::learn_from_training_file(&cfg.train_file, cfg.min_count, cfg.debug_mode)?
    } else {
        Vocabulary::load_from_file(&cfg.read_vocab_file, cfg.min_count)?
    };

    if cfg.debug_mode > 0 {
        vocab.print_summary();
    }

    if !cfg.save_vocab_file.is_empty() {
        if cfg.debug_mode > 0 {
            eprintln!("Saving vocabulary to file: '{}'", cfg.save_vocab_file);
        }
        vocab.save_to_file(&cfg.save_vocab_file)?;
    }

    if cfg.output_file.is_empty() {
        log::info!("no output file specified, skipping training");
        return Ok(());
    }

    if vocab.len() < 2 {
        return Err("the training data yielded an empty vocabulary".into());
    }

    vocab.build_huffman_tree();
    if cfg.negative > 0 {
        vocab.init_unigram_table();
    }
    // frozen from here on; workers only read it
    let vocab = vocab;

    let starting_alpha = cfg.alpha.unwrap_or(if cfg.cbow { 0.05 } else { 0.025 });
    let params = TrainParams {
        training_file: cfg.train_file.clone(),
        training_file_size,
        layer1_size: cfg.size,
        window: cfg.window,
        total_iter: cfg.iter,
        cbow: cfg.cbow,
        hs: cfg.hs,
        negative_samples: cfg.negative,
        sample: cfg.sample,
        num_threads: cfg.threads,
        starting_alpha,
        debug_mode: cfg.debug_mode,
    };

    let progress = TrainProgress::new(starting_alpha);
    let exp_table = ExpTable::new();
    let net = NeuralNet::new(vocab.len(), cfg.size, cfg.hs, cfg.negative > 0);
    let net = Arc::new(net);

    thread::scope(|scope| {
        // we don't need these "moved", but "thread_id" has to be moved
        let vocab = &vocab;
        let params = &params;
        let progress = &progress;
        let exp_table = &exp_table;

        for thread_id in 0..params.num_threads {
            let net = Arc::clone(&net);
            scope.spawn(move || {
                if let Err(e) = train_model_thread(net, vocab, exp_table, thread_id, params, progress)
                {
                    log::error!("worker {thread_id} stopped early: {e}");
                }
            });
        }
    });
    if cfg.debug_mode > 1 {
        eprintln!();
    }

    if cfg.classes == 0 {
        net.save_vectors(&vocab, &cfg.output_file, cfg.binary)?;
    } else {
        net.save_classes(&vocab, &cfg.output_file, cfg.classes)?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cfg = parse_args();
    train(&cfg)
}
