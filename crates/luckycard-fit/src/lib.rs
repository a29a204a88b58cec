//! Parameter estimation for the suspicion model.
//!
//! Observed rating series are compared against predictions built from a
//! trial-derived [`FeatureTable`]. Two search strategies are available:
//! exhaustive [`grid_search`] over a candidate list and a Gaussian-process
//! [`BayesianOptimizer`]. Every fit reports R², MSE, AIC and BIC.

pub mod bayes;
pub mod error;
pub mod features;
pub mod fitter;
mod gp;
pub mod grid;
pub mod metrics;
pub mod model;
pub mod ratings;

pub use bayes::{BayesConfig, BayesOutcome, BayesianOptimizer, Dimension};
pub use error::FitError;
pub use features::{Feature, FeatureConfig, FeatureTable, Normalization};
pub use fitter::{FitResult, FitStrategy, fit_response, fit_subjects};
pub use grid::{GridOutcome, grid_search};
pub use metrics::{FitMetrics, RSquared, aic, bic, mean_squared_error, r_squared};
pub use model::PredictionModel;
pub use ratings::RatingScale;
