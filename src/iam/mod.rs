//! IAM policy model: statements, documents and managed policy references.

mod managed_policy;
mod policy;

pub use managed_policy::ManagedPolicy;
pub use policy::{Effect, PolicyDocument, PolicyStatement, Principal, POLICY_VERSION};
