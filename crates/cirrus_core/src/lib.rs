//! # cirrus_core
//!
//! Dependency-aware resource graph composition and output propagation.
//!
//! This crate is the synthesis core: it models resources and the lazy
//! references between them, resolves a deterministic creation order across
//! nested composition units, applies late-bound identity bindings, and
//! finalizes named outputs for external consumers. Actually creating
//! resources is delegated to a [`Provisioner`] collaborator.
//!
//! # Architecture
//!
//! - **Resources**: typed nodes declared with literal or referenced inputs
//! - **Graph**: one edge per consumed attribute; DFS topological order
//! - **Units**: a tree of independently named stacks; inputs flow down,
//!   outputs flow up
//! - **Bindings**: deferred trust wiring applied after both sides resolve
//! - **Outputs**: path-qualified name/value pairs finalized all-or-nothing
//!
//! # Example
//!
//! ```rust,ignore
//! use cirrus_core::{App, ResourceKind, Value, synthesize};
//!
//! let mut app = App::new("platform");
//! let root = app.root();
//! let vpc = app.declare(root, ResourceKind::Network, "vpc", inputs)?;
//! app.export(root, "vpc_id", app.attribute(vpc, "vpc_id"))?;
//!
//! let result = synthesize(&mut app, &provisioner).await?;
//! println!("{:?}", result.outputs());
//! ```

pub mod binding;
pub mod error;
pub mod graph;
pub mod output;
pub mod provision;
pub mod resource;
pub mod stack;
pub mod synth;

// Re-export main types for convenience
pub use binding::{BindingKind, PendingBinding, PrincipalSource, ResolvedBinding};
pub use error::{SynthError, SynthResult};
pub use graph::DependencyGraph;
pub use output::OutputRegistry;
pub use provision::{ProvisionFailure, Provisioner, ResourceDescriptor};
pub use resource::{AttrRef, Attributes, ResourceId, ResourceKind, ResourceModel, Value};
pub use stack::{UnitId, UnitTree};
pub use synth::{synthesize, App, SynthesisResult};
