//! Cross-validation splitters

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    pub index: usize,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffled K-fold and stratified K-fold splitter
#[derive(Debug, Clone, Copy)]
pub struct CrossValidator {
    folds: usize,
    seed: u64,
}

impl CrossValidator {
    pub fn new(folds: usize, seed: u64) -> Self {
        Self {
            folds: folds.max(2),
            seed,
        }
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    /// Shuffle rows once, then cut into contiguous folds
    ///
    /// The first `n % k` folds hold one extra row.
    pub fn k_fold(&self, n_samples: usize) -> Vec<FoldSplit> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);

        let base = n_samples / self.folds;
        let remainder = n_samples % self.folds;
        let mut current = 0;

        (0..self.folds)
            .map(|index| {
                let size = if index < remainder { base + 1 } else { base };
                let test = indices[current..current + size].to_vec();
                let train = indices[..current]
                    .iter()
                    .chain(indices[current + size..].iter())
                    .copied()
                    .collect();
                current += size;
                FoldSplit { index, train, test }
            })
            .collect()
    }

    /// Deal each class's shuffled rows round-robin across folds
    ///
    /// Every fold keeps roughly the class proportions of `y`. Classes are
    /// visited in ascending order so the split is reproducible.
    pub fn stratified_k_fold(&self, y: &[f64]) -> Vec<FoldSplit> {
        let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, v) in y.iter().enumerate() {
            by_class.entry(v.round() as i64).or_default().push(idx);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); self.folds];
        let mut offset = 0;
        for rows in by_class.values_mut() {
            rows.shuffle(&mut rng);
            for &row in rows.iter() {
                buckets[offset % self.folds].push(row);
                offset += 1;
            }
        }

        (0..self.folds)
            .map(|index| {
                let test = buckets[index].clone();
                let train = buckets
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != index)
                    .flat_map(|(_, b)| b.iter().copied())
                    .collect();
                FoldSplit { index, train, test }
            })
            .collect()
    }
}
