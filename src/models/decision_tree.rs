//! Variance-reduction regression tree used as the boosting weak learner

use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2};
use rayon::prelude::*;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Regression tree with midpoint-threshold splits on a variance
/// criterion. Leaf values are shrunk by `reg_lambda`.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub reg_lambda: f64,
    root: Option<Node>,
    importances: Vec<f64>,
}

impl RegressionTree {
    pub fn new(max_depth: usize, min_samples_leaf: usize, reg_lambda: f64) -> Self {
        Self {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: min_samples_leaf.max(1),
            reg_lambda,
            root: None,
            importances: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(ForecastError::MathError(format!(
                "Feature matrix has {} rows but target has {}",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 {
            return Err(ForecastError::MathError(
                "Cannot fit a tree on an empty dataset".to_string(),
            ));
        }

        let indices: Vec<usize> = (0..x.nrows()).collect();
        let mut importances = vec![0.0; x.ncols()];
        self.root = Some(self.grow(x, y, &indices, 0, &mut importances));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.importances = importances;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| ForecastError::MathError("Tree has not been fitted".to_string()))?;
        let preds: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let row = x.row(i).to_vec();
                predict_one(root, &row)
            })
            .collect();
        Ok(Array1::from_vec(preds))
    }

    /// Per-split variance reduction accumulated during `fit`, normalized
    /// to sum to one.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    fn leaf_value(&self, y: &Array1<f64>, indices: &[usize]) -> f64 {
        if indices.is_empty() {
            return 0.0;
        }
        let sum: f64 = indices.iter().map(|&i| y[i]).sum();
        sum / (indices.len() as f64 + self.reg_lambda)
    }

    fn grow(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> Node {
        let n = indices.len();
        if depth >= self.max_depth
            || n < self.min_samples_split
            || n < 2 * self.min_samples_leaf
            || is_constant(y, indices)
        {
            return Node::Leaf {
                value: self.leaf_value(y, indices),
            };
        }

        let split = match self.best_split(x, y, indices) {
            Some(s) => s,
            None => {
                return Node::Leaf {
                    value: self.leaf_value(y, indices),
                }
            }
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, split.feature]] <= split.threshold);
        if left_idx.len() < self.min_samples_leaf || right_idx.len() < self.min_samples_leaf {
            return Node::Leaf {
                value: self.leaf_value(y, indices),
            };
        }

        importances[split.feature] += n as f64 * split.gain;

        let left = Box::new(self.grow(x, y, &left_idx, depth + 1, importances));
        let right = Box::new(self.grow(x, y, &right_idx, depth + 1, importances));
        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        }
    }

    /// Scan every feature for the threshold with the largest variance
    /// reduction. Features are scanned in parallel; within a feature the
    /// candidates are midpoints between consecutive distinct values,
    /// evaluated with prefix sums over the sorted rows.
    fn best_split(&self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Option<Split> {
        let n = indices.len() as f64;
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent_var = total_sq / n - (total_sum / n).powi(2);

        (0..x.ncols())
            .into_par_iter()
            .filter_map(|feature| {
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

                let mut best: Option<Split> = None;
                let mut left_sum = 0.0;
                let mut left_sq = 0.0;
                for (pos, &i) in order.iter().enumerate().take(order.len() - 1) {
                    left_sum += y[i];
                    left_sq += y[i] * y[i];

                    let here = x[[i, feature]];
                    let next = x[[order[pos + 1], feature]];
                    if here == next {
                        continue;
                    }
                    let left_n = (pos + 1) as f64;
                    let right_n = n - left_n;
                    if (left_n as usize) < self.min_samples_leaf
                        || (right_n as usize) < self.min_samples_leaf
                    {
                        continue;
                    }

                    let right_sum = total_sum - left_sum;
                    let right_sq = total_sq - left_sq;
                    let left_var = left_sq / left_n - (left_sum / left_n).powi(2);
                    let right_var = right_sq / right_n - (right_sum / right_n).powi(2);
                    let weighted = (left_n * left_var + right_n * right_var) / n;
                    let gain = parent_var - weighted;

                    if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                        best = Some(Split {
                            feature,
                            threshold: (here + next) / 2.0,
                            gain,
                        });
                    }
                }
                best
            })
            .max_by(|a, b| a.gain.total_cmp(&b.gain))
    }
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

fn predict_one(node: &Node, row: &[f64]) -> f64 {
    match node {
        Node::Leaf { value } => *value,
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] <= *threshold {
                predict_one(left, row)
            } else {
                predict_one(right, row)
            }
        }
    }
}

fn is_constant(y: &Array1<f64>, indices: &[usize]) -> bool {
    indices
        .windows(2)
        .all(|w| (y[w[0]] - y[w[1]]).abs() < 1e-12)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn splits_a_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![0.0, 0.0, 0.0, 5.0, 5.0, 5.0];
        let mut tree = RegressionTree::new(3, 1, 0.0);
        tree.fit(&x, &y).unwrap();
        let preds = tree.predict(&x).unwrap();
        assert!(preds[0].abs() < 1e-9);
        assert!((preds[5] - 5.0).abs() < 1e-9);
        // all the signal is in the single feature
        assert!((tree.feature_importances()[0] - 1.0).abs() < 1e-9);
    }
}
