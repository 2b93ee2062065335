//! streamstack planner
//!
//! Builds the resource-dependency graph of a media streaming stack,
//! validates it and emits the provisioning engine's template document.
//!
//! The pipeline is linear: declare resources into a [`StackGraph`], hand
//! it to the [`Validator`], and emit the resulting [`ValidGraph`] with the
//! [`Emitter`]. An invalid graph never reaches emission.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dag;
pub mod declaration;
pub mod emit;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod resource;
pub mod validate;
pub mod value;

pub use config::PipelineConfig;
pub use dag::{Edge, EdgeOrigin, GraphPhase, StackGraph};
pub use declaration::StackDeclaration;
pub use emit::{Document, Emitter};
pub use error::{GraphError, GraphResult};
pub use output::OutputBinding;
pub use pipeline::MediaPipeline;
pub use resource::{AttributeSpec, DeletionPolicy, NativeRef, ResourceDescriptor, ResourceHandle};
pub use validate::{ValidGraph, ValidationReport, Validator};
pub use value::{AttributeReference, Properties, PropertyValue};
