//! Box-constrained evolutionary optimizers.
//!
//! Every optimizer searches `[0, 1]^n` for the vector that maximizes an
//! objective. Candidates are not required to sum to one during the search;
//! callers normalize the winner with [`normalize_long_only`], which also
//! handles the degenerate all-zero case.
//!
//! Two in-process implementations are provided:
//!
//! - [`DifferentialEvolution`]: best/1/bin with dithered mutation.
//! - [`GeneticAlgorithm`]: elitist GA with tournament selection, blend
//!   crossover and Gaussian mutation.

use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fitness assigned to invalid candidates and non-finite objective values.
pub const WORST_FITNESS: f64 = -1e12;

/// Sum below which a weight vector is considered all-zero.
const DEGENERATE_SUM: f64 = 1e-12;

/// Per-gene mutation probability once an individual is picked for mutation.
const GENE_MUTATION_PROB: f64 = 0.5;

/// Blend crossover extent (BLX-α).
const BLEND_ALPHA: f64 = 0.5;

/// Search parameters shared by all optimizers.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EvolutionConfig {
    /// Candidates per generation.
    pub population_size: usize,
    /// Generation budget.
    pub max_generations: usize,
    /// DE differential weight lower bound (dithered up to 1.0), or GA
    /// Gaussian mutation standard deviation.
    pub mutation_scale: f64,
    /// GA probability that an offspring is mutated.
    pub mutation_rate: f64,
    /// DE binomial crossover rate, or GA mating probability.
    pub crossover_rate: f64,
    /// GA tournament size.
    pub tournament_size: usize,
    /// Stop once the fitness standard deviation is within
    /// `tolerance * |mean fitness|`.
    pub tolerance: f64,
    /// Stop as soon as the best fitness reaches this value.
    pub target_fitness: Option<f64>,
    /// RNG seed; entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            max_generations: 50,
            mutation_scale: 0.5,
            mutation_rate: 0.3,
            crossover_rate: 0.7,
            tournament_size: 3,
            tolerance: 1e-6,
            target_fitness: None,
            seed: None,
        }
    }
}

impl EvolutionConfig {
    /// Small, fast differential-evolution budget (10 generations).
    pub fn differential() -> Self {
        Self {
            population_size: 30,
            max_generations: 10,
            mutation_scale: 0.5,
            crossover_rate: 0.7,
            ..Self::default()
        }
    }

    /// Genetic-algorithm budget with Gaussian mutation of scale 0.2.
    pub fn genetic() -> Self {
        Self {
            population_size: 50,
            max_generations: 100,
            mutation_scale: 0.2,
            mutation_rate: 0.3,
            crossover_rate: 0.5,
            tournament_size: 3,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// A box-constrained maximizer over `[0, 1]^n`.
pub trait Optimizer {
    /// Search for the vector of length `n` maximizing `objective`.
    ///
    /// Returns an empty vector when `n == 0`.
    fn optimize(
        &self,
        objective: &dyn Fn(&[f64]) -> f64,
        n: usize,
        config: &EvolutionConfig,
    ) -> Vec<f64>;

    fn name(&self) -> &'static str;
}

/// Differential evolution, best/1/bin.
#[derive(Clone, Copy, Debug, Default)]
pub struct DifferentialEvolution;

impl Optimizer for DifferentialEvolution {
    fn optimize(
        &self,
        objective: &dyn Fn(&[f64]) -> f64,
        n: usize,
        config: &EvolutionConfig,
    ) -> Vec<f64> {
        if n == 0 {
            return Vec::new();
        }
        let mut rng = config.rng();
        let pop_size = config.population_size.max(4);

        let mut population = random_population(&mut rng, pop_size, n);
        let mut fitness: Vec<f64> = population.iter().map(|x| evaluate(objective, x)).collect();
        let mut best = argmax(&fitness);

        for _ in 0..config.max_generations {
            if reached_target(fitness[best], config) || converged(&fitness, config.tolerance) {
                break;
            }

            let f = if config.mutation_scale < 1.0 {
                rng.gen_range(config.mutation_scale..1.0)
            } else {
                config.mutation_scale
            };

            for i in 0..pop_size {
                let (r1, r2) = pick_two_distinct(&mut rng, pop_size, i);
                let forced = rng.gen_range(0..n);

                let mut trial = population[i].clone();
                for k in 0..n {
                    if k == forced || rng.r#gen::<f64>() < config.crossover_rate {
                        let v = population[best][k] + f * (population[r1][k] - population[r2][k]);
                        trial[k] = v.clamp(0.0, 1.0);
                    }
                }

                let score = evaluate(objective, &trial);
                if score >= fitness[i] {
                    population[i] = trial;
                    fitness[i] = score;
                    if score > fitness[best] {
                        best = i;
                    }
                }
            }
        }

        population.swap_remove(best)
    }

    fn name(&self) -> &'static str {
        "differential_evolution"
    }
}

/// Elitist genetic algorithm.
#[derive(Clone, Copy, Debug, Default)]
pub struct GeneticAlgorithm;

impl Optimizer for GeneticAlgorithm {
    fn optimize(
        &self,
        objective: &dyn Fn(&[f64]) -> f64,
        n: usize,
        config: &EvolutionConfig,
    ) -> Vec<f64> {
        if n == 0 {
            return Vec::new();
        }
        let mut rng = config.rng();
        let pop_size = config.population_size.max(2);
        let tournament = config.tournament_size.max(1);

        let mut population = random_population(&mut rng, pop_size, n);
        let mut fitness: Vec<f64> = population.iter().map(|x| evaluate(objective, x)).collect();

        let first = argmax(&fitness);
        let mut elite = population[first].clone();
        let mut elite_fitness = fitness[first];

        for _ in 0..config.max_generations {
            if reached_target(elite_fitness, config) || converged(&fitness, config.tolerance) {
                break;
            }

            let mut offspring: Vec<Vec<f64>> = (0..pop_size)
                .map(|_| population[tournament_pick(&mut rng, &fitness, tournament)].clone())
                .collect();

            for pair in offspring.chunks_exact_mut(2) {
                if rng.gen_bool(config.crossover_rate.clamp(0.0, 1.0)) {
                    let (a, b) = pair.split_at_mut(1);
                    blend(&mut rng, &mut a[0], &mut b[0]);
                }
            }

            for child in offspring.iter_mut() {
                if rng.gen_bool(config.mutation_rate.clamp(0.0, 1.0)) {
                    for gene in child.iter_mut() {
                        if rng.gen_bool(GENE_MUTATION_PROB) {
                            *gene = (*gene + config.mutation_scale * gaussian(&mut rng)).clamp(0.0, 1.0);
                        }
                    }
                }
            }

            fitness = offspring.iter().map(|x| evaluate(objective, x)).collect();
            population = offspring;

            // Elitism: the best candidate seen so far always survives.
            let gen_best = argmax(&fitness);
            if fitness[gen_best] > elite_fitness {
                elite = population[gen_best].clone();
                elite_fitness = fitness[gen_best];
            } else {
                let worst = argmin(&fitness);
                population[worst] = elite.clone();
                fitness[worst] = elite_fitness;
            }
        }

        elite
    }

    fn name(&self) -> &'static str {
        "genetic_algorithm"
    }
}

// ---------------------------------------------------------------------------
// Weight helpers
// ---------------------------------------------------------------------------

pub fn equal_weights(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

/// Clip to non-negative finite values and scale to sum to one.
///
/// Falls back to equal weights when the vector sums to (near) zero.
pub fn normalize_long_only(mut w: Vec<f64>) -> Vec<f64> {
    if w.is_empty() {
        return w;
    }

    for x in &mut w {
        if !x.is_finite() || *x < 0.0 {
            *x = 0.0;
        }
    }

    let sum = w.iter().sum::<f64>();
    if sum <= DEGENERATE_SUM {
        return equal_weights(w.len());
    }

    for x in &mut w {
        *x /= sum;
    }
    w
}

/// Whether `w` would trigger the equal-weight fallback in [`normalize_long_only`].
pub fn is_degenerate(w: &[f64]) -> bool {
    w.iter().filter(|x| x.is_finite() && **x > 0.0).sum::<f64>() <= DEGENERATE_SUM
}

// ---------------------------------------------------------------------------
// Search internals
// ---------------------------------------------------------------------------

fn evaluate(objective: &dyn Fn(&[f64]) -> f64, x: &[f64]) -> f64 {
    let f = objective(x);
    if f.is_finite() { f.max(WORST_FITNESS) } else { WORST_FITNESS }
}

fn random_population(rng: &mut StdRng, size: usize, n: usize) -> Vec<Vec<f64>> {
    (0..size)
        .map(|_| (0..n).map(|_| rng.r#gen::<f64>()).collect())
        .collect()
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

fn argmin(values: &[f64]) -> usize {
    let mut worst = 0;
    for (i, v) in values.iter().enumerate() {
        if *v < values[worst] {
            worst = i;
        }
    }
    worst
}

fn reached_target(best: f64, config: &EvolutionConfig) -> bool {
    config.target_fitness.is_some_and(|t| best >= t)
}

/// Population has collapsed: fitness spread within `tol` of the mean.
fn converged(fitness: &[f64], tol: f64) -> bool {
    let n = fitness.len() as f64;
    if n < 2.0 {
        return true;
    }
    let mean = fitness.iter().sum::<f64>() / n;
    let var = fitness.iter().map(|f| (f - mean) * (f - mean)).sum::<f64>() / n;
    var.sqrt() <= tol * mean.abs()
}

/// Two distinct indices in `0..size`, both different from `exclude`.
fn pick_two_distinct(rng: &mut StdRng, size: usize, exclude: usize) -> (usize, usize) {
    let mut r1 = rng.gen_range(0..size);
    while r1 == exclude {
        r1 = rng.gen_range(0..size);
    }
    let mut r2 = rng.gen_range(0..size);
    while r2 == exclude || r2 == r1 {
        r2 = rng.gen_range(0..size);
    }
    (r1, r2)
}

fn tournament_pick(rng: &mut StdRng, fitness: &[f64], size: usize) -> usize {
    let mut winner = rng.gen_range(0..fitness.len());
    for _ in 1..size {
        let challenger = rng.gen_range(0..fitness.len());
        if fitness[challenger] > fitness[winner] {
            winner = challenger;
        }
    }
    winner
}

/// BLX-α crossover, gene by gene, clipped to the unit box.
fn blend(rng: &mut StdRng, a: &mut [f64], b: &mut [f64]) {
    for (x1, x2) in a.iter_mut().zip(b.iter_mut()) {
        let gamma = (1.0 + 2.0 * BLEND_ALPHA) * rng.r#gen::<f64>() - BLEND_ALPHA;
        let c1 = (1.0 - gamma) * *x1 + gamma * *x2;
        let c2 = gamma * *x1 + (1.0 - gamma) * *x2;
        *x1 = c1.clamp(0.0, 1.0);
        *x2 = c2.clamp(0.0, 1.0);
    }
}

/// Standard normal draw (Box-Muller).
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1 = rng.r#gen::<f64>().max(f64::MIN_POSITIVE);
    let u2 = rng.r#gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}
