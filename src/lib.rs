//! Declarative deployment descriptor for the items lookup service.
//!
//! One key-value table, one function reading from it, and one HTTP API
//! routing to that function, plus a CORS preflight responder. Evaluating the
//! descriptor assembles a resource graph; synthesis serializes it into a
//! CloudFormation template that the AWS control plane provisions. Nothing in
//! here runs at request time.

pub mod asset;
pub mod deploy;
pub mod error;
pub mod items_api;
pub mod names;
pub mod resources;
pub mod stack;
pub mod template;

pub use error::SynthError;
