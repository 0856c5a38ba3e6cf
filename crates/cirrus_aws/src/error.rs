//! Error types for the AWS construct layer.

use thiserror::Error;

/// Result type alias for construct operations.
pub type AwsResult<T> = Result<T, AwsError>;

/// Errors raised while building AWS-shaped constructs.
#[derive(Error, Debug)]
pub enum AwsError {
    #[error("invalid CIDR block: {0}")]
    InvalidCidr(String),

    #[error("CIDR {cidr} cannot be carved into {requested} /{prefix} subnets")]
    CidrExhausted {
        cidr: String,
        requested: usize,
        prefix: u8,
    },

    #[error("network requires at least one availability zone")]
    NoAvailabilityZones,

    #[error(transparent)]
    Synth(#[from] cirrus_core::SynthError),
}
