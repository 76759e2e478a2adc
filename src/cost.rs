//! Vector costs and weightings
//!
//! Every edge carries a fixed-arity cost vector (distance, height gain,
//! unsuitability). Queries and witness searches collapse it to a scalar
//! with a weighting drawn from the probability simplex.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::{Add, AddAssign, Sub};

/// Number of cost criteria. Fixed at build time; all cost arithmetic and
/// the separation LP are sized by this.
pub const DIM: usize = 3;

/// Tolerance for cost comparisons: shortcut dedup, LP feasibility and the
/// fixed-point emit test.
pub const COST_ACCURACY: f64 = 1e-5;

/// Non-negative cost vector with one component per criterion.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cost {
    pub values: [f64; DIM],
}

impl Cost {
    pub fn new(values: [f64; DIM]) -> Self {
        Cost { values }
    }

    pub fn zero() -> Self {
        Cost::default()
    }

    /// Scalar projection under a weighting.
    pub fn dot(&self, config: &Config) -> f64 {
        self.values
            .iter()
            .zip(config.values.iter())
            .map(|(c, w)| c * w)
            .sum()
    }

    /// Componentwise ≤ with at least one component different.
    pub fn dominates(&self, other: &Cost) -> bool {
        let mut some_different = false;
        for i in 0..DIM {
            if self.values[i] > other.values[i] {
                return false;
            }
            if self.values[i] != other.values[i] {
                some_different = true;
            }
        }
        some_different
    }

    /// Total order used for constraint dedup and shortcut sorting.
    pub fn lex_cmp(&self, other: &Cost) -> Ordering {
        for i in 0..DIM {
            match self.values[i].partial_cmp(&other.values[i]) {
                Some(Ordering::Equal) | None => continue,
                Some(ord) => return ord,
            }
        }
        Ordering::Equal
    }

    /// Equality within `COST_ACCURACY` per component.
    pub fn approx_eq(&self, other: &Cost) -> bool {
        self.values
            .iter()
            .zip(other.values.iter())
            .all(|(a, b)| (a - b).abs() <= COST_ACCURACY)
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        let mut values = [0.0; DIM];
        for i in 0..DIM {
            values[i] = self.values[i] + rhs.values[i];
        }
        Cost { values }
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, rhs: Cost) {
        for i in 0..DIM {
            self.values[i] += rhs.values[i];
        }
    }
}

impl Sub for Cost {
    type Output = Cost;

    fn sub(self, rhs: Cost) -> Cost {
        let mut values = [0.0; DIM];
        for i in 0..DIM {
            values[i] = self.values[i] - rhs.values[i];
        }
        Cost { values }
    }
}

/// Point of the probability simplex: w ≥ 0, Σw = 1.
///
/// Bitwise equality of two configs is meaningful: the LP fixed-point
/// test compares solutions exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub values: [f64; DIM],
}

impl Config {
    pub fn new(values: [f64; DIM]) -> Self {
        Config { values }
    }

    pub fn uniform() -> Self {
        Config {
            values: [1.0 / DIM as f64; DIM],
        }
    }

    /// Unit weighting on criterion `i`.
    pub fn axis(i: usize) -> Self {
        let mut values = [0.0; DIM];
        values[i] = 1.0;
        Config { values }
    }
}
