mod estimator;
mod scorer;

pub use estimator::Estimator;
pub use scorer::Scorer;
