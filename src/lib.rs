//! IAM roles GitHub Actions workflows can assume through OIDC federation.
//!
//! Declares (or references) the GitHub OIDC identity provider of an account
//! and roles whose trust policy only admits tokens issued for one repository,
//! then renders them as a CloudFormation template.

pub mod config;
pub mod iam;
pub mod provider;
pub mod role;
pub mod stack;
pub mod template;
pub mod validation;

pub use provider::GithubActionsIdentityProvider;
pub use role::{GithubActionsRole, GithubActionsRoleProps, RoleError};
pub use stack::{MetadataEntry, MetadataLevel, Stack, StackError};
pub use validation::ValidationError;
