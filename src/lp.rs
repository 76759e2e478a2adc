//! Separation LP
//!
//! Given the witness constraint rows `c − S`, find a weighting w in the
//! simplex under which no known witness is strictly cheaper than the
//! candidate shortcut, or certify that none exists. Solved as the matrix
//! game `max_w min_i row_i · w`: shift the rows positive, solve the row
//! player's LP with a dense primal simplex (Bland's rule keeps the pivot
//! sequence, and therefore the returned vertex, deterministic), and
//! read the column player's mixed strategy off the slack columns.

use crate::cost::{Config, Cost, COST_ACCURACY, DIM};

const PIVOT_EPS: f64 = 1e-9;

/// One instance per worker thread, reused across pairs.
#[derive(Debug)]
pub struct SeparationLp {
    rows: Vec<Cost>,
    solution: Config,
}

impl Default for SeparationLp {
    fn default() -> Self {
        SeparationLp::new()
    }
}

impl SeparationLp {
    pub fn new() -> Self {
        SeparationLp {
            rows: Vec::new(),
            solution: Config::uniform(),
        }
    }

    pub fn reset(&mut self) {
        self.rows.clear();
    }

    /// Append the requirement `row · w ≥ 0`.
    pub fn add_constraint(&mut self, row: Cost) {
        self.rows.push(row);
    }

    pub fn constraint_count(&self) -> usize {
        self.rows.len()
    }

    /// Best worst-slack weighting, or None when every simplex point
    /// leaves some constraint strictly negative.
    pub fn solve(&mut self) -> Option<Config> {
        if self.rows.is_empty() {
            self.solution = Config::uniform();
            return Some(self.solution);
        }

        let (value, weights) = self.solve_game();
        if value < -COST_ACCURACY {
            return None;
        }
        self.solution = Config::new(weights);
        Some(self.solution)
    }

    pub fn variable_values(&self) -> Config {
        self.solution
    }

    /// Value and optimal column strategy of `max_w min_i row_i · w`.
    fn solve_game(&self) -> (f64, [f64; DIM]) {
        let n = self.rows.len();

        let min_entry = self
            .rows
            .iter()
            .flat_map(|r| r.values.iter().copied())
            .fold(f64::INFINITY, f64::min);
        let shift = 1.0 - min_entry.min(0.0);

        // Row player's LP: maximize Σx subject to, per criterion j,
        // Σ_i (row_i[j] + shift) x_i ≤ 1 and x ≥ 0. Slack basis is
        // immediately feasible.
        let cols = n + DIM + 1;
        let mut tab = vec![vec![0.0f64; cols]; DIM];
        let mut basis = [0usize; DIM];
        for (j, row) in tab.iter_mut().enumerate() {
            for i in 0..n {
                row[i] = self.rows[i].values[j] + shift;
            }
            row[n + j] = 1.0;
            row[cols - 1] = 1.0;
            basis[j] = n + j;
        }
        let mut profit = vec![0.0f64; cols - 1];
        for p in profit.iter_mut().take(n) {
            *p = 1.0;
        }

        loop {
            // Bland: smallest improving column enters.
            let entering = match (0..cols - 1).find(|&c| profit[c] > PIVOT_EPS) {
                Some(c) => c,
                None => break,
            };

            // Smallest ratio leaves; ties by smallest basis variable.
            let mut leaving: Option<usize> = None;
            let mut best_ratio = f64::INFINITY;
            for j in 0..DIM {
                if tab[j][entering] > PIVOT_EPS {
                    let ratio = tab[j][cols - 1] / tab[j][entering];
                    let better = match leaving {
                        None => true,
                        Some(l) => {
                            ratio < best_ratio - PIVOT_EPS
                                || (ratio < best_ratio + PIVOT_EPS && basis[j] < basis[l])
                        }
                    };
                    if better {
                        leaving = Some(j);
                        best_ratio = ratio;
                    }
                }
            }
            let leaving = match leaving {
                Some(l) => l,
                // Bounded by construction; bail out of the pivot loop on
                // numerical breakdown instead of spinning.
                None => break,
            };

            let pivot = tab[leaving][entering];
            for c in 0..cols {
                tab[leaving][c] /= pivot;
            }
            let pivot_row = tab[leaving].clone();
            for (j, row) in tab.iter_mut().enumerate() {
                if j == leaving {
                    continue;
                }
                let factor = row[entering];
                if factor != 0.0 {
                    for c in 0..cols {
                        row[c] -= factor * pivot_row[c];
                    }
                }
            }
            let factor = profit[entering];
            for (c, p) in profit.iter_mut().enumerate() {
                *p -= factor * pivot_row[c];
            }
            basis[leaving] = entering;
        }

        let objective: f64 = (0..DIM)
            .filter(|&j| basis[j] < n)
            .map(|j| tab[j][cols - 1])
            .sum();
        debug_assert!(objective > 0.0);

        // Dual values of the criterion constraints are the column
        // player's unnormalized strategy.
        let mut weights = [0.0f64; DIM];
        let mut total = 0.0;
        for (j, w) in weights.iter_mut().enumerate() {
            *w = (-profit[n + j]).max(0.0);
            total += *w;
        }
        for w in weights.iter_mut() {
            *w /= total;
        }

        (1.0 / objective - shift, weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rows_yields_uniform() {
        let mut lp = SeparationLp::new();
        assert_eq!(lp.solve(), Some(Config::uniform()));
    }

    #[test]
    fn test_single_row_picks_best_axis() {
        let mut lp = SeparationLp::new();
        lp.add_constraint(Cost::new([1.0, 2.0, 3.0]));
        let w = lp.solve().unwrap();
        // Worst slack is maximized by the largest component.
        assert!((w.values[2] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_strictly_negative_row_is_infeasible() {
        let mut lp = SeparationLp::new();
        lp.add_constraint(Cost::new([-1.0, -1.0, -1.0]));
        assert_eq!(lp.solve(), None);
    }

    #[test]
    fn test_opposed_rows_with_negative_third_are_infeasible() {
        // max_w min(−2w₀+w₁−w₂, w₀−2w₁−w₂) = −0.5 < 0.
        let mut lp = SeparationLp::new();
        lp.add_constraint(Cost::new([-2.0, 1.0, -1.0]));
        lp.add_constraint(Cost::new([1.0, -2.0, -1.0]));
        assert_eq!(lp.solve(), None);
    }

    #[test]
    fn test_opposed_rows_escape_to_free_criterion() {
        // Both rows are zero on the third criterion, so all the mass
        // lands there and both slacks close at exactly zero.
        let mut lp = SeparationLp::new();
        lp.add_constraint(Cost::new([-2.0, 1.0, 0.0]));
        lp.add_constraint(Cost::new([1.0, -2.0, 0.0]));
        let w = lp.solve().unwrap();
        assert!((w.values[2] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_clears_rows() {
        let mut lp = SeparationLp::new();
        lp.add_constraint(Cost::new([-1.0, -1.0, -1.0]));
        assert_eq!(lp.solve(), None);
        lp.reset();
        assert_eq!(lp.constraint_count(), 0);
        assert!(lp.solve().is_some());
    }

    #[test]
    fn test_solve_is_deterministic() {
        let rows = [
            Cost::new([3.0, -1.0, 0.5]),
            Cost::new([-2.0, 4.0, 0.0]),
            Cost::new([1.0, 1.0, -3.0]),
        ];
        let mut first = SeparationLp::new();
        let mut second = SeparationLp::new();
        for r in &rows {
            first.add_constraint(*r);
            second.add_constraint(*r);
        }
        let a = first.solve();
        let b = second.solve();
        assert_eq!(a, b);
        if let Some(w) = a {
            let sum: f64 = w.values.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
            assert!(w.values.iter().all(|&v| v >= 0.0));
        }
    }
}
