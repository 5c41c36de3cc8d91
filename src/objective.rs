//! Objective functions maximized by the allocation optimizers.
//!
//! Each objective owns the statistics it needs (mean returns, covariance,
//! current weights) so it can be evaluated thousands of times per run
//! without touching the history store.

use crate::optimize::{WORST_FITNESS, normalize_long_only};

/// Trading periods per year used to annualize daily volatility.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Annualized volatility the low-risk profile aims for.
pub const DEFAULT_TARGET_VOL: f64 = 0.10;

/// Penalty per unit of volatility miss; large enough to dominate returns.
pub const DEFAULT_VOL_PENALTY: f64 = 1000.0;

/// Maximize return while holding annualized volatility at a target.
///
/// `f(w) = w·μ − κ·|sqrt(252·wᵀΣw) − target|`, with `w` normalized first.
#[derive(Clone, Debug)]
pub struct VolTargetObjective {
    pub mean_returns: Vec<f64>,
    pub covariance: Vec<Vec<f64>>,
    pub target_vol: f64,
    pub penalty: f64,
}

impl VolTargetObjective {
    pub fn new(mean_returns: Vec<f64>, covariance: Vec<Vec<f64>>) -> Self {
        Self {
            mean_returns,
            covariance,
            target_vol: DEFAULT_TARGET_VOL,
            penalty: DEFAULT_VOL_PENALTY,
        }
    }

    /// Build from a return matrix (rows = periods, columns = assets).
    pub fn from_returns(rows: &[Vec<f64>]) -> Self {
        Self::new(column_means(rows), covariance_matrix(rows))
    }

    pub fn with_target(mut self, target_vol: f64, penalty: f64) -> Self {
        self.target_vol = target_vol;
        self.penalty = penalty;
        self
    }

    /// Annualized volatility of a normalized weight vector.
    pub fn annualized_vol(&self, weights: &[f64]) -> f64 {
        let var = dot(weights, &mat_vec_mul(&self.covariance, weights)).max(0.0);
        (PERIODS_PER_YEAR * var).sqrt()
    }

    pub fn expected_return(&self, weights: &[f64]) -> f64 {
        dot(weights, &self.mean_returns)
    }

    pub fn evaluate(&self, x: &[f64]) -> f64 {
        let w = normalize_long_only(x.to_vec());
        let vol = self.annualized_vol(&w);
        self.expected_return(&w) - self.penalty * (vol - self.target_vol).abs()
    }
}

/// Maximize the expected return `w·μ` of the normalized weights.
#[derive(Clone, Debug)]
pub struct ReturnObjective {
    pub mean_returns: Vec<f64>,
}

impl ReturnObjective {
    pub fn new(mean_returns: Vec<f64>) -> Self {
        Self { mean_returns }
    }

    pub fn evaluate(&self, x: &[f64]) -> f64 {
        dot(&normalize_long_only(x.to_vec()), &self.mean_returns)
    }
}

/// A decoded pairwise move: split the combined weight of `i` and `j`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PairMove {
    pub i: usize,
    pub j: usize,
    /// Fraction of the pair's combined weight that goes to `i`.
    pub split: f64,
}

/// Reallocate between exactly two assets, everything else held fixed.
///
/// Genes are `(gi, gj, x)` in `[0, 1]`; `gi`/`gj` decode to asset indices
/// `⌊g·N⌋ mod N`. A candidate naming the same asset twice is invalid.
#[derive(Clone, Debug)]
pub struct PairwiseObjective {
    pub current: Vec<f64>,
    pub mean_returns: Vec<f64>,
}

impl PairwiseObjective {
    pub const GENES: usize = 3;

    pub fn new(current: Vec<f64>, mean_returns: Vec<f64>) -> Self {
        debug_assert_eq!(current.len(), mean_returns.len());
        Self {
            current,
            mean_returns,
        }
    }

    fn index(&self, gene: f64) -> usize {
        let n = self.current.len();
        let raw = (gene.clamp(0.0, 1.0) * n as f64) as usize;
        raw % n
    }

    /// Decode genes into a move, or `None` when both indices coincide.
    pub fn decode(&self, genes: &[f64]) -> Option<PairMove> {
        if self.current.len() < 2 || genes.len() < Self::GENES {
            return None;
        }
        let i = self.index(genes[0]);
        let j = self.index(genes[1]);
        if i == j {
            return None;
        }
        Some(PairMove {
            i,
            j,
            split: genes[2].clamp(0.0, 1.0),
        })
    }

    /// Weights after applying `mv`. The total weight is unchanged.
    pub fn apply(&self, mv: PairMove) -> Vec<f64> {
        let mut w = self.current.clone();
        let pooled = self.current[mv.i] + self.current[mv.j];
        w[mv.i] = mv.split * pooled;
        w[mv.j] = (1.0 - mv.split) * pooled;
        w
    }

    pub fn evaluate(&self, genes: &[f64]) -> f64 {
        match self.decode(genes) {
            Some(mv) => dot(&self.apply(mv), &self.mean_returns),
            None => WORST_FITNESS,
        }
    }
}

// ---------------------------------------------------------------------------
// Matrix helpers
// ---------------------------------------------------------------------------

pub fn column_means(matrix: &[Vec<f64>]) -> Vec<f64> {
    let rows = matrix.len();
    let Some(cols) = matrix.first().map(Vec::len) else {
        return Vec::new();
    };

    let mut sums = vec![0.0; cols];
    for row in matrix {
        for (j, v) in row.iter().enumerate() {
            sums[j] += *v;
        }
    }

    sums.into_iter().map(|s| s / rows as f64).collect()
}

/// Sample covariance (n − 1 denominator) of the columns of `matrix`.
pub fn covariance_matrix(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let rows = matrix.len();
    let Some(cols) = matrix.first().map(Vec::len) else {
        return Vec::new();
    };
    let means = column_means(matrix);

    let mut cov = vec![vec![0.0; cols]; cols];

    for row in matrix {
        for i in 0..cols {
            let di = row[i] - means[i];
            for j in i..cols {
                let dj = row[j] - means[j];
                cov[i][j] += di * dj;
            }
        }
    }

    let denom = (rows as f64 - 1.0).max(1.0);
    for i in 0..cols {
        for j in i..cols {
            let v = cov[i][j] / denom;
            cov[i][j] = v;
            cov[j][i] = v;
        }
    }

    cov
}

pub fn mat_vec_mul(matrix: &[Vec<f64>], vec: &[f64]) -> Vec<f64> {
    matrix
        .iter()
        .map(|row| row.iter().zip(vec).map(|(a, b)| a * b).sum::<f64>())
        .collect()
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
