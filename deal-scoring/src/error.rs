use thiserror::Error;

/// Permanent scoring failures. These describe the listing or comparable data
/// itself, so retrying the same inputs cannot succeed.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("listing {0} has no usable price per sqft")]
    NoListingPrice(String),

    #[error("comparable set has no usable reference price")]
    NoReferencePrice,
}
