//! Small-sample estimators behind stable `fit` / `predict` interfaces.
//!
//! Books are shallow (often fewer than 20 levels), so both estimators are
//! solved directly with iteratively reweighted least squares on `nalgebra`
//! matrices. Callers treat every error as "no estimate" and fall back.

use nalgebra::{DMatrix, DVector};

/// Estimator failures. Always recovered by the owning model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    InsufficientData { needed: usize, got: usize },
    InvalidInput(&'static str),
    DimensionMismatch,
    Singular,
    NonFinite,
    NotFitted,
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientData { needed, got } => {
                write!(f, "insufficient data: need {} distinct points, got {}", needed, got)
            }
            Self::InvalidInput(what) => write!(f, "invalid input: {}", what),
            Self::DimensionMismatch => write!(f, "feature and target lengths differ"),
            Self::Singular => write!(f, "singular system"),
            Self::NonFinite => write!(f, "non-finite estimate"),
            Self::NotFitted => write!(f, "estimator not fitted"),
        }
    }
}

impl std::error::Error for ModelError {}

/// Single-feature regression: `fit(x, y)` then `predict(x)`.
pub trait Regressor {
    fn fit(&mut self, x: &[f64], y: &[f64]) -> Result<(), ModelError>;
    fn predict(&self, x: f64) -> Result<f64, ModelError>;
}

/// Binary classifier over a feature matrix (one row per sample).
pub trait BinaryClassifier {
    fn fit(&mut self, x: &DMatrix<f64>, y: &DVector<f64>) -> Result<(), ModelError>;
    /// Probability of class 1 for every row.
    fn predict_proba(&self, x: &DMatrix<f64>) -> Result<DVector<f64>, ModelError>;
    fn is_fitted(&self) -> bool;
}

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Solve `(Xᵀ W X + ridge) β = Xᵀ W z` via Cholesky.
fn weighted_normal_solve(
    x: &DMatrix<f64>,
    w: &DVector<f64>,
    z: &DVector<f64>,
    ridge: &DMatrix<f64>,
) -> Result<DVector<f64>, ModelError> {
    let xw = DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x[(i, j)] * w[i]);
    let a = x.transpose() * &xw + ridge;
    let b = xw.transpose() * z;
    let beta = a.cholesky().ok_or(ModelError::Singular)?.solve(&b);
    if beta.iter().all(|v| v.is_finite()) {
        Ok(beta)
    } else {
        Err(ModelError::NonFinite)
    }
}

fn distinct_count(values: &[f64]) -> usize {
    let mut bits: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
    bits.sort_unstable();
    bits.dedup();
    bits.len()
}

// =============================================================================
// MEDIAN (QUANTILE 0.5) REGRESSION
// =============================================================================

/// Least-absolute-deviation line `y = a + b·x`, fitted by IRLS.
#[derive(Debug, Clone)]
pub struct MedianRegression {
    pub max_iter: usize,
    pub tol: f64,
    coef: Option<(f64, f64)>,
}

impl Default for MedianRegression {
    fn default() -> Self {
        Self {
            max_iter: 50,
            tol: 1e-8,
            coef: None,
        }
    }
}

impl MedianRegression {
    pub fn coefficients(&self) -> Option<(f64, f64)> {
        self.coef
    }
}

impl Regressor for MedianRegression {
    fn fit(&mut self, x: &[f64], y: &[f64]) -> Result<(), ModelError> {
        if x.len() != y.len() {
            return Err(ModelError::DimensionMismatch);
        }
        let distinct = distinct_count(x);
        if distinct < 2 {
            return Err(ModelError::InsufficientData {
                needed: 2,
                got: distinct,
            });
        }

        let n = x.len();
        let design = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { x[i] });
        let target = DVector::from_column_slice(y);
        let ridge = DMatrix::zeros(2, 2);

        // Ordinary least squares start
        let mut beta = weighted_normal_solve(&design, &DVector::from_element(n, 1.0), &target, &ridge)?;

        for _ in 0..self.max_iter {
            let residuals = &target - &design * &beta;
            let weights = residuals.map(|r| 1.0 / r.abs().max(1e-6));
            let next = weighted_normal_solve(&design, &weights, &target, &ridge)?;
            let step = (&next - &beta).amax();
            beta = next;
            if step <= self.tol * (1.0 + beta.amax()) {
                break;
            }
        }

        self.coef = Some((beta[0], beta[1]));
        Ok(())
    }

    fn predict(&self, x: f64) -> Result<f64, ModelError> {
        let (a, b) = self.coef.ok_or(ModelError::NotFitted)?;
        let y = a + b * x;
        if y.is_finite() {
            Ok(y)
        } else {
            Err(ModelError::NonFinite)
        }
    }
}

// =============================================================================
// LOGISTIC REGRESSION (WARM-STARTED)
// =============================================================================

/// L2-regularized logistic regression with intercept, fitted by Newton
/// iterations. Refits continue from the previous coefficients.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    /// Inverse regularization strength (1.0 mirrors the usual default)
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
    /// `[intercept, w1, .., wp]`
    coef: Option<DVector<f64>>,
    last_iterations: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-6,
            coef: None,
            last_iterations: 0,
        }
    }
}

impl LogisticRegression {
    pub fn coefficients(&self) -> Option<&DVector<f64>> {
        self.coef.as_ref()
    }

    /// Newton steps taken by the most recent fit.
    pub fn last_iterations(&self) -> usize {
        self.last_iterations
    }

    fn with_intercept(x: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(x.nrows(), x.ncols() + 1, |i, j| {
            if j == 0 {
                1.0
            } else {
                x[(i, j - 1)]
            }
        })
    }
}

impl BinaryClassifier for LogisticRegression {
    fn fit(&mut self, x: &DMatrix<f64>, y: &DVector<f64>) -> Result<(), ModelError> {
        if x.nrows() != y.len() {
            return Err(ModelError::DimensionMismatch);
        }
        if x.nrows() < 2 {
            return Err(ModelError::InsufficientData {
                needed: 2,
                got: x.nrows(),
            });
        }

        let design = Self::with_intercept(x);
        let p = design.ncols();
        let lambda = 1.0 / self.c.max(1e-12);
        let mut penalty = DMatrix::identity(p, p) * lambda;
        penalty[(0, 0)] = 0.0;

        // Warm start from the previous fit when the shape still matches
        let mut beta = match &self.coef {
            Some(prev) if prev.len() == p => prev.clone(),
            _ => DVector::zeros(p),
        };

        let mut iterations = 0;
        for _ in 0..self.max_iter {
            iterations += 1;
            let mu = (&design * &beta).map(sigmoid);
            let weights = mu.map(|m| (m * (1.0 - m)).max(1e-10));

            // Newton step expressed as a weighted least-squares problem on
            // the working response z = Xβ + (y - μ) / w
            let eta = &design * &beta;
            let z = DVector::from_fn(y.len(), |i, _| eta[i] + (y[i] - mu[i]) / weights[i]);
            let next = weighted_normal_solve(&design, &weights, &z, &penalty)?;

            let step = (&next - &beta).amax();
            beta = next;
            if step < self.tol {
                break;
            }
        }

        self.last_iterations = iterations;
        self.coef = Some(beta);
        Ok(())
    }

    fn predict_proba(&self, x: &DMatrix<f64>) -> Result<DVector<f64>, ModelError> {
        let beta = self.coef.as_ref().ok_or(ModelError::NotFitted)?;
        if x.ncols() + 1 != beta.len() {
            return Err(ModelError::DimensionMismatch);
        }
        let probs = (Self::with_intercept(x) * beta).map(sigmoid);
        if probs.iter().all(|p| p.is_finite()) {
            Ok(probs)
        } else {
            Err(ModelError::NonFinite)
        }
    }

    fn is_fitted(&self) -> bool {
        self.coef.is_some()
    }
}
