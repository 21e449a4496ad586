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

const KMEANS_ITERATIONS: usize = 10;

/// Spherical K-means over `count` row vectors of dimension `size`: centroids
/// are L2-normalized each round and rows are assigned to the centroid with
/// the largest dot product. Returns the cluster id of every row.
pub fn cluster(vectors: &[f64], count: usize, size: usize, classes: usize) -> Vec<usize> {
    assert!(classes > 0);
    assert!(vectors.len() == count * size);
    log::debug!("clustering {count} vectors into {classes} classes");

    let mut cl: Vec<usize> = (0..count).map(|a| a % classes).collect();
    let mut cent = vec![0.0f64; classes * size];
    let mut centcn = vec![0usize; classes];

    for _ in 0..KMEANS_ITERATIONS {
        cent.fill(0.0);
        centcn.fill(1);
        for c in 0..count {
            for d in 0..size {
                cent[size * cl[c] + d] += vectors[c * size + d];
            }
            centcn[cl[c]] += 1;
        }
        for b in 0..classes {
            let mut closev = 0.0;
            for c in 0..size {
                cent[size * b + c] /= centcn[b] as f64;
                closev += cent[size * b + c] * cent[size * b + c];
            }
            closev = closev.sqrt();
            if closev > 0.0 {
                for c in 0..size {
                    cent[size * b + c] /= closev;
                }
            }
        }
        for c in 0..count {
            let mut closev = -10.0;
            let mut closeid = 0;
            for d in 0..classes {
                let mut x = 0.0;
                for b in 0..size {
                    x += cent[size * d + b] * vectors[c * size + b];
                }
                if x > closev {
                    closev = x;
                    closeid = d;
                }
            }
            cl[c] = closeid;
        }
    }
    cl
}
