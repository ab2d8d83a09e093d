use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use log::{debug, info};
use rand::rngs::SmallRng;
use rand::seq::IteratorRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::topk::TopK;
use super::{ClusterError, ClusterResult};
use crate::core::float::SprFloat;
use crate::distances::{DenseSparseDistance, InvertedDotDistance};
use crate::vector::sparse::{scaled_add_sparse, DenseVector, SparseVector};

/// Number of top clusters a sample is assigned to in soft mode.
pub trait SampleDegree<F: SprFloat>: Send + Sync {
    fn degree(&self, sample: &SparseVector<F>) -> usize;
}

/// Default degree strategy: every sample joins the same fixed number of
/// clusters, never fewer than one.
#[derive(Debug, Clone, Copy)]
pub struct ConstantDegree(pub usize);

impl<F: SprFloat> SampleDegree<F> for ConstantDegree {
    fn degree(&self, _sample: &SparseVector<F>) -> usize {
        self.0.max(1)
    }
}

// soft-update weight is 1 / (distance + damping)
const SOFT_WEIGHT_DAMPING: f64 = 10.0;

/// Configuration of a [`SparseKMeansModel`]. The tree clones one of these per
/// internal node, so everything here is cheaply cloneable.
#[derive(Clone)]
pub struct ModelParams<F: SprFloat> {
    pub k: usize,
    pub iterations: usize,
    pub exclusive: bool,
    pub init_mode: String,
    pub distance: Arc<dyn DenseSparseDistance<F>>,
    pub degree: Arc<dyn SampleDegree<F>>,
    pub cut_rate: F,
    pub rng_seed: Option<u64>,
}

impl<F: SprFloat> ModelParams<F> {
    /// Defaults mirror the usual routing setup: exclusive assignment,
    /// "kmeans++" seeding, inverted-dot scoring, degree 1.
    ///
    /// # Panics
    /// Panics if `k` is zero.
    pub fn new(k: usize) -> Self {
        assert!(k > 0, "at least one center is required");
        Self {
            k,
            iterations: 1000,
            exclusive: true,
            init_mode: "kmeans++".to_owned(),
            distance: Arc::new(InvertedDotDistance),
            degree: Arc::new(ConstantDegree(1)),
            cut_rate: F::from(2.0).unwrap(),
            rng_seed: None,
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn with_init_mode(mut self, mode: &str) -> Self {
        self.init_mode = mode.to_owned();
        self
    }

    pub fn with_distance(mut self, distance: Arc<dyn DenseSparseDistance<F>>) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_degree(mut self, degree: Arc<dyn SampleDegree<F>>) -> Self {
        self.degree = degree;
        self
    }

    pub fn with_cut_rate(mut self, cut_rate: F) -> Self {
        self.cut_rate = cut_rate;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}

/// How a fit ended: early, because assignments stabilized, or by exhausting
/// the configured iteration cap. Both are successful fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitOutcome {
    Converged { rounds: usize },
    IterationLimit,
}

enum Step {
    Converged,
    Continue,
}

/// Fits a configurable number of dense centers over a sparse sample set,
/// with exclusive (hard) or soft assignment.
///
/// Per-sample assignment data is kept after a fit for diagnostic reads and
/// released with [`clear_training_outcome`](Self::clear_training_outcome);
/// the sample set itself is only borrowed for the duration of `fit`.
pub struct SparseKMeansModel<F: SprFloat> {
    params: ModelParams<F>,
    centers: Vec<DenseVector<F>>,
    mass: Vec<F>,
    assignment: Vec<usize>,
    memberships: Vec<Vec<(usize, F)>>,
}

impl<F: SprFloat> SparseKMeansModel<F> {
    pub fn new(params: ModelParams<F>) -> Self {
        Self {
            params,
            centers: Vec::new(),
            mass: Vec::new(),
            assignment: Vec::new(),
            memberships: Vec::new(),
        }
    }

    pub fn k(&self) -> usize {
        self.params.k
    }

    pub fn is_exclusive(&self) -> bool {
        self.params.exclusive
    }

    pub fn params(&self) -> &ModelParams<F> {
        &self.params
    }

    /// The fitted centers; the index into this slice is the cluster id.
    pub fn centers(&self) -> &[DenseVector<F>] {
        &self.centers
    }

    /// Hard-mode cluster id per sample, in sample order. Empty before a fit,
    /// in soft mode, or after [`clear_training_outcome`](Self::clear_training_outcome).
    pub fn assignment(&self) -> &[usize] {
        &self.assignment
    }

    /// Soft-mode membership lists per sample, best first.
    pub fn memberships(&self) -> &[Vec<(usize, F)>] {
        &self.memberships
    }

    /// Accumulated mass per center after the latest update step: a plain
    /// count in hard mode, a sum of soft weights otherwise.
    pub fn mass(&self) -> &[F] {
        &self.mass
    }

    /// Seeds centers, then alternates assignment and update steps until the
    /// assignments stabilize or the iteration cap is reached.
    pub fn fit<S>(&mut self, samples: &[S]) -> ClusterResult<FitOutcome>
    where
        S: Borrow<SparseVector<F>> + Sync,
    {
        info!(
            "fitting {} centers over {} samples ({} mode)",
            self.params.k,
            samples.len(),
            if self.params.exclusive { "exclusive" } else { "soft" }
        );

        self.initialize_centers(samples)?;

        if self.params.exclusive {
            // sentinel assignment: the first pass can never match it, so the
            // first update step always runs
            self.assignment = vec![usize::MAX; samples.len()];
            self.memberships.clear();
        } else {
            self.memberships = vec![Vec::new(); samples.len()];
            self.assignment.clear();
        }
        self.mass = vec![F::zero(); self.params.k];

        for round in 0..self.params.iterations {
            match self.iterate(samples)? {
                Step::Converged => {
                    debug!("assignments stable after {} rounds", round + 1);
                    return Ok(FitOutcome::Converged { rounds: round + 1 });
                }
                Step::Continue => {}
            }
        }

        Ok(FitOutcome::IterationLimit)
    }

    /// Linear argmin scan over the fitted centers. Read-only; safe for any
    /// number of concurrent callers as long as no fit is in flight.
    pub fn predict_best(&self, x: &SparseVector<F>) -> (usize, F) {
        let mut best_id = 0usize;
        let mut best = F::infinity();
        for (cid, center) in self.centers.iter().enumerate() {
            let d = self.params.distance.compute(&center.view(), x);
            if d < best {
                best = d;
                best_id = cid;
            }
        }
        (best_id, best)
    }

    /// Up to `k` best matches, ascending by distance, pruned by the relative
    /// cut rate: entries scoring worse than `best * cut_rate` are dropped.
    pub fn predict_topk(&self, x: &SparseVector<F>, k: usize) -> Vec<(usize, F)> {
        let mut topk = TopK::new(k);
        for (cid, center) in self.centers.iter().enumerate() {
            topk.insert(cid, self.params.distance.compute(&center.view(), x));
        }

        let ranked = topk.finalize();
        match ranked.first() {
            Some(&(_, best)) => {
                let cut = best * self.params.cut_rate;
                ranked.into_iter().filter(|&(_, d)| d <= cut).collect()
            }
            None => ranked,
        }
    }

    /// Releases the per-sample training data while keeping the learned
    /// centers; called once a node's clustering is finalized.
    pub fn clear_training_outcome(&mut self) {
        self.assignment.clear();
        self.memberships.clear();
    }

    fn rng(&self) -> SmallRng {
        match self.params.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_rng(&mut rand::rng()),
        }
    }

    fn initialize_centers<S>(&mut self, samples: &[S]) -> ClusterResult<()>
    where
        S: Borrow<SparseVector<F>> + Sync,
    {
        let mut rng = self.rng();

        match self.params.init_mode.as_str() {
            "random" => {
                if samples.len() < self.params.k {
                    return Err(ClusterError::NotEnoughSamples {
                        needed: self.params.k,
                        got: samples.len(),
                    });
                }
                let chosen = (0..samples.len()).choose_multiple(&mut rng, self.params.k);
                self.centers = chosen
                    .into_iter()
                    .map(|i| samples[i].borrow().to_dense())
                    .collect();
            }
            "kmeans++" => {
                if samples.is_empty() {
                    return Err(ClusterError::NotEnoughSamples { needed: 1, got: 0 });
                }
                let first = (0..samples.len())
                    .choose(&mut rng)
                    .expect("failed to choose the first center");

                self.centers.clear();
                let mut next = first;
                while self.centers.len() < self.params.k {
                    self.centers.push(samples[next].borrow().to_dense());
                    if self.centers.len() == self.params.k {
                        break;
                    }

                    // chain seeding: scores come from the most recently added
                    // center only, not the minimum over all chosen centers
                    let last = &self.centers[self.centers.len() - 1];
                    let distance = &self.params.distance;
                    let scores: Vec<F> = samples
                        .par_iter()
                        .map(|s| distance.compute(&last.view(), s.borrow()))
                        .collect();

                    let mut cumulative = scores;
                    for i in 1..cumulative.len() {
                        cumulative[i] = cumulative[i] + cumulative[i - 1];
                    }
                    let total = cumulative[cumulative.len() - 1];

                    let threshold = F::from(rng.random::<f64>()).unwrap() * total;
                    next = cumulative
                        .partition_point(|&c| c < threshold)
                        .min(samples.len() - 1);
                }
            }
            other => return Err(ClusterError::UnknownInitMode(other.to_owned())),
        }

        Ok(())
    }

    fn iterate<S>(&mut self, samples: &[S]) -> ClusterResult<Step>
    where
        S: Borrow<SparseVector<F>> + Sync,
    {
        let converged = if self.params.exclusive {
            self.assign_hard(samples)
        } else {
            self.assign_soft(samples)
        };
        if converged {
            return Ok(Step::Converged);
        }

        if self.params.exclusive {
            self.update_hard(samples)?;
        } else {
            self.update_soft(samples)?;
        }
        Ok(Step::Continue)
    }

    /// Hard assignment step: per-sample argmin scans, embarrassingly parallel
    /// over read-only centers. Returns true when the assignment is a fixed
    /// point of the current centers.
    fn assign_hard<S>(&mut self, samples: &[S]) -> bool
    where
        S: Borrow<SparseVector<F>> + Sync,
    {
        let fresh: Vec<usize> = samples
            .par_iter()
            .map(|s| self.predict_best(s.borrow()).0)
            .collect();

        if fresh == self.assignment {
            return true;
        }
        self.assignment = fresh;
        false
    }

    /// Soft assignment step. Convergence compares only the best (first)
    /// membership entry per sample; two empty lists count as unchanged.
    fn assign_soft<S>(&mut self, samples: &[S]) -> bool
    where
        S: Borrow<SparseVector<F>> + Sync,
    {
        let fresh: Vec<Vec<(usize, F)>> = samples
            .par_iter()
            .map(|s| {
                let s = s.borrow();
                let degree = self.params.degree.degree(s).max(1);
                self.predict_topk(s, degree)
            })
            .collect();

        let stable = fresh.len() == self.memberships.len()
            && fresh
                .iter()
                .zip(self.memberships.iter())
                .all(|(a, b)| match (a.first(), b.first()) {
                    (Some(x), Some(y)) => x.0 == y.0,
                    (None, None) => true,
                    _ => false,
                });
        if stable {
            return true;
        }
        self.memberships = fresh;
        false
    }

    /// Hard update step: each worker accumulates into private per-center
    /// buffers which are merged afterwards, so no locking is needed.
    fn update_hard<S>(&mut self, samples: &[S]) -> ClusterResult<()>
    where
        S: Borrow<SparseVector<F>> + Sync,
    {
        if self.assignment.len() != samples.len() {
            return Err(ClusterError::AssignmentSizeMismatch {
                samples: samples.len(),
                tracked: self.assignment.len(),
            });
        }

        let k = self.params.k;
        let dim = self.centers.first().map(|c| c.len()).unwrap_or(0);

        let (centers, mass) = samples
            .par_iter()
            .zip(self.assignment.par_iter())
            .fold(
                || (vec![DenseVector::zeros(dim); k], vec![F::zero(); k]),
                |(mut centers, mut mass), (s, &cid)| {
                    scaled_add_sparse(&mut centers[cid], F::one(), s.borrow());
                    mass[cid] += F::one();
                    (centers, mass)
                },
            )
            .reduce(
                || (vec![DenseVector::zeros(dim); k], vec![F::zero(); k]),
                merge_buffers,
            );

        self.apply_update(centers, mass)
    }

    /// Soft update step: every membership entry contributes a distance-damped
    /// weight to its center, so degree 1 approximates but does not equal the
    /// hard update.
    fn update_soft<S>(&mut self, samples: &[S]) -> ClusterResult<()>
    where
        S: Borrow<SparseVector<F>> + Sync,
    {
        if self.memberships.len() != samples.len() {
            return Err(ClusterError::AssignmentSizeMismatch {
                samples: samples.len(),
                tracked: self.memberships.len(),
            });
        }

        let k = self.params.k;
        let dim = self.centers.first().map(|c| c.len()).unwrap_or(0);
        let damping = F::from(SOFT_WEIGHT_DAMPING).unwrap();

        let (centers, mass) = samples
            .par_iter()
            .zip(self.memberships.par_iter())
            .fold(
                || (vec![DenseVector::zeros(dim); k], vec![F::zero(); k]),
                |(mut centers, mut mass), (s, membership)| {
                    for &(cid, d) in membership {
                        let w = F::one() / (d + damping);
                        scaled_add_sparse(&mut centers[cid], w, s.borrow());
                        mass[cid] += w;
                    }
                    (centers, mass)
                },
            )
            .reduce(
                || (vec![DenseVector::zeros(dim); k], vec![F::zero(); k]),
                merge_buffers,
            );

        self.apply_update(centers, mass)
    }

    /// Final division by mass, parallel over centers. An empty center is a
    /// fit failure, not a degenerate center; nothing is re-seeded.
    fn apply_update(&mut self, mut centers: Vec<DenseVector<F>>, mass: Vec<F>) -> ClusterResult<()> {
        if let Some(cid) = mass.iter().position(|&m| m == F::zero()) {
            return Err(ClusterError::EmptyCenter(cid));
        }

        centers
            .par_iter_mut()
            .zip(mass.par_iter())
            .for_each(|(center, &m)| center.mapv_inplace(|x| x / m));

        self.centers = centers;
        self.mass = mass;
        Ok(())
    }
}

fn merge_buffers<F: SprFloat>(
    (mut centers, mut mass): (Vec<DenseVector<F>>, Vec<F>),
    (other_centers, other_mass): (Vec<DenseVector<F>>, Vec<F>),
) -> (Vec<DenseVector<F>>, Vec<F>) {
    for (acc, other) in centers.iter_mut().zip(other_centers) {
        *acc += &other;
    }
    for (acc, other) in mass.iter_mut().zip(other_mass) {
        *acc += other;
    }
    (centers, mass)
}

impl<F: SprFloat> fmt::Display for SparseKMeansModel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SparseKMeansModel(k={}, mode={}, init={}, centers={})",
            self.params.k,
            if self.params.exclusive { "exclusive" } else { "soft" },
            self.params.init_mode,
            self.centers.len()
        )
    }
}
