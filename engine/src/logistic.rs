use nalgebra::DVector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::TrainingConfig;
use crate::error::EngineError;
use crate::features::FeatureVector;
use crate::model::{sigmoid, ClassifierModel};

/// L2-regularised logistic regression fitted by full-batch gradient descent.
///
/// Minimises `mean(log_loss) + ||w||^2 / (2 * C * n)`; the bias is not
/// penalised. Starts from zero weights and visits samples in order, so the
/// same inputs always produce the same model.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    pub max_iterations: usize,
    pub learning_rate: f64,
    pub c: f64,
    pub tolerance: f64,
}

#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub classifier: ClassifierModel,
    pub iterations: usize,
    pub converged: bool,
    pub loss: f64,
}

impl LogisticRegression {
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            learning_rate: config.learning_rate,
            c: config.c,
            tolerance: config.tolerance,
        }
    }

    pub fn fit(
        &self,
        rows: &[FeatureVector],
        targets: &[f64],
        dim: usize,
        cancel: &CancellationToken,
    ) -> Result<FitOutcome, EngineError> {
        if rows.is_empty() {
            return Err(EngineError::Training("no training samples".to_string()));
        }
        if rows.len() != targets.len() {
            return Err(EngineError::Training(format!(
                "{} rows but {} targets",
                rows.len(),
                targets.len()
            )));
        }
        if self.c <= 0.0 || self.learning_rate <= 0.0 {
            return Err(EngineError::Training(
                "C and learning rate must be positive".to_string(),
            ));
        }

        let n = rows.len() as f64;
        let penalty = 1.0 / (self.c * n);
        let mut weights = DVector::<f64>::zeros(dim);
        let mut bias = 0.0;
        let mut grad = DVector::<f64>::zeros(dim);
        let mut previous_loss = f64::INFINITY;
        let mut loss = f64::INFINITY;

        for iteration in 1..=self.max_iterations {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            grad.fill(0.0);
            let mut bias_grad = 0.0;
            let mut data_loss = 0.0;

            for (row, &y) in rows.iter().zip(targets) {
                let mut z = bias;
                for (j, x) in row.iter() {
                    z += weights[j] * x;
                }
                data_loss += softplus(z) - y * z;

                let residual = sigmoid(z) - y;
                bias_grad += residual;
                for (j, x) in row.iter() {
                    grad[j] += residual * x;
                }
            }

            loss = data_loss / n + 0.5 * penalty * weights.norm_squared();
            if !loss.is_finite() {
                return Err(EngineError::Training(format!(
                    "loss diverged at iteration {}",
                    iteration
                )));
            }

            grad.scale_mut(1.0 / n);
            grad.axpy(penalty, &weights, 1.0);
            weights.axpy(-self.learning_rate, &grad, 1.0);
            bias -= self.learning_rate * bias_grad / n;

            if (previous_loss - loss).abs() <= self.tolerance * loss.abs().max(1.0) {
                debug!("Logistic regression converged after {} iterations (loss {:.6})", iteration, loss);
                return Ok(FitOutcome {
                    classifier: ClassifierModel::new(weights, bias),
                    iterations: iteration,
                    converged: true,
                    loss,
                });
            }
            previous_loss = loss;
        }

        warn!(
            "Logistic regression did not converge within {} iterations (loss {:.6})",
            self.max_iterations, loss
        );
        Ok(FitOutcome {
            classifier: ClassifierModel::new(weights, bias),
            iterations: self.max_iterations,
            converged: false,
            loss,
        })
    }
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::from_config(&TrainingConfig::default())
    }
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}
