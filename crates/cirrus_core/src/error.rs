//! Error types for the synthesis core.

use thiserror::Error;

use crate::provision::ProvisionFailure;

/// Result type alias for synthesis operations.
pub type SynthResult<T> = Result<T, SynthError>;

/// Errors that can occur while composing or synthesizing a resource graph.
///
/// Every variant is fatal for the current synthesis pass. The caller may
/// retry with a fresh pass; nothing here is retried internally.
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("dependency cycle: {}", .members.join(" -> "))]
    Cycle { members: Vec<String> },

    #[error("attribute '{attribute}' of '{resource}' dereferenced before resolution")]
    UnresolvedAttribute { resource: String, attribute: String },

    #[error("output '{name}' of unit '{unit}' queried before synthesis completed")]
    NotYetResolved { unit: String, name: String },

    #[error("outputs finalized while {missing} resource(s) remain unresolved")]
    IncompleteGraph { missing: usize },

    #[error("binding '{binding}' references '{target}' which never resolved")]
    BindingTargetMissing { binding: String, target: String },

    #[error("unit '{consumer_unit}' references '{producer}' which is neither an ancestor's resource nor a declared child output")]
    ForeignReference {
        consumer_unit: String,
        producer: String,
    },

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("unit '{unit}' declares no output named '{name}'")]
    UnknownOutput { unit: String, name: String },

    #[error("unit '{unit}' already contains a resource named '{name}'")]
    DuplicateResource { unit: String, name: String },

    #[error("provisioning '{resource}' failed: {source}")]
    Provisioning {
        resource: String,
        #[source]
        source: ProvisionFailure,
    },
}
