use log::{debug, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use crate::template::{self, Value};

#[derive(Debug, Error)]
pub enum StackError {
  #[error("There is already a construct with id \"{0}\" in stack")]
  DuplicateId(String),
  #[error("Construct id \"{0}\" must be non-empty and cannot contain '/'")]
  InvalidId(String),
  #[error("There is already an output with id \"{0}\" in stack")]
  DuplicateOutput(String),
  #[error("Invalid policy statement: {}", .0.join("; "))]
  InvalidStatement(Vec<String>),
  #[error("No resource with logical id \"{0}\" in stack")]
  UnknownResource(String),
  #[error("Validation failed with the following errors:\n{}", .0.join("\n"))]
  Validation(Vec<String>),
  #[error("Serialization error: {0}")]
  Serialize(#[from] serde_json::Error),
  #[error("Yaml encode error: {0}")]
  Yaml(#[from] serde_yaml::Error),
}

/// A single resource entry of the template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
  #[serde(rename = "Type")]
  pub kind: String,
  #[serde(rename = "Properties")]
  pub properties: serde_json::Value,
}

impl Resource {
  pub fn new<P: Serialize>(kind: &str, properties: &P) -> Result<Self, StackError> {
    Ok(Self {
      kind: kind.to_string(),
      properties: serde_json::to_value(properties)?,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
  #[serde(rename = "Value")]
  pub value: Value,
  #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataLevel {
  Error,
  Warning,
}

impl fmt::Display for MetadataLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MetadataLevel::Error => f.write_str("error"),
      MetadataLevel::Warning => f.write_str("warning"),
    }
  }
}

/// Diagnostic attached to the stack by a construct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
  pub level: MetadataLevel,
  /// Path of the construct that reported it
  pub path: String,
  pub data: String,
}

#[derive(Serialize)]
struct Template<'a> {
  #[serde(rename = "Resources")]
  resources: &'a BTreeMap<String, Resource>,
  #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty")]
  outputs: &'a BTreeMap<String, Output>,
}

/// The deployment context every construct is added to.
///
/// Collects resources, outputs and diagnostics, and renders them into a single
/// template. Account and partition are optional: when unknown they stay
/// symbolic and the provisioning engine resolves them at deploy time.
#[derive(Debug, Clone, Default)]
pub struct Stack {
  name: String,
  account: Option<String>,
  partition: Option<String>,
  paths: BTreeSet<String>,
  resources: BTreeMap<String, Resource>,
  outputs: BTreeMap<String, Output>,
  metadata: Vec<MetadataEntry>,
}

impl Stack {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Self::default()
    }
  }

  pub fn with_account(mut self, account: impl Into<String>) -> Self {
    self.account = Some(account.into());
    self
  }

  pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
    self.partition = Some(partition.into());
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn partition(&self) -> Option<&str> {
    self.partition.as_deref()
  }

  /// Account id, or a reference to `AWS::AccountId` if not pinned
  pub fn account_value(&self) -> Value {
    match &self.account {
      Some(a) => Value::literal(a.as_str()),
      None => Value::reference(template::ACCOUNT_ID),
    }
  }

  /// Partition, or a reference to `AWS::Partition` if not pinned
  pub fn partition_value(&self) -> Value {
    match &self.partition {
      Some(p) => Value::literal(p.as_str()),
      None => Value::reference(template::PARTITION),
    }
  }

  /// Reserve a construct path and derive its logical id.
  ///
  /// The id is the alphanumeric part of the path components followed by the
  /// first 8 hex digits of the SHA-256 of the full path. `Resource` and
  /// `Default` components only contribute to the hash.
  pub fn allocate_logical_id(&mut self, path: &str) -> Result<String, StackError> {
    if !self.paths.insert(path.to_string()) {
      return Err(StackError::DuplicateId(path.to_string()));
    }
    Ok(logical_id(path))
  }

  /// Check an id given to a construct by the caller. `/` is reserved as the
  /// path separator.
  pub fn check_construct_id(id: &str) -> Result<(), StackError> {
    if id.is_empty() || id.contains('/') {
      return Err(StackError::InvalidId(id.to_string()));
    }
    Ok(())
  }

  pub fn add_resource(&mut self, logical_id: &str, resource: Resource) {
    debug!("Adding {} {} to stack {}", resource.kind, logical_id, self.name);
    self.resources.insert(logical_id.to_string(), resource);
  }

  pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
    self.resources.get(logical_id)
  }

  pub fn resource_mut(&mut self, logical_id: &str) -> Result<&mut Resource, StackError> {
    self
      .resources
      .get_mut(logical_id)
      .ok_or_else(|| StackError::UnknownResource(logical_id.to_string()))
  }

  pub fn resources_of_type<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = (&'a str, &'a Resource)> + 'a {
    self
      .resources
      .iter()
      .filter(move |(_, r)| r.kind == kind)
      .map(|(id, r)| (id.as_str(), r))
  }

  pub fn add_output(&mut self, id: &str, value: Value, description: Option<String>) -> Result<(), StackError> {
    if self.outputs.contains_key(id) {
      return Err(StackError::DuplicateOutput(id.to_string()));
    }
    self.outputs.insert(id.to_string(), Output { value, description });
    Ok(())
  }

  pub fn add_error(&mut self, path: &str, message: impl Into<String>) {
    self.annotate(MetadataLevel::Error, path, message.into());
  }

  pub fn add_warning(&mut self, path: &str, message: impl Into<String>) {
    self.annotate(MetadataLevel::Warning, path, message.into());
  }

  fn annotate(&mut self, level: MetadataLevel, path: &str, data: String) {
    warn!("[{}] {}: {}", level, path, data);
    self.metadata.push(MetadataEntry {
      level,
      path: path.to_string(),
      data,
    });
  }

  pub fn metadata_entries(&self) -> &[MetadataEntry] {
    &self.metadata
  }

  pub fn errors(&self) -> impl Iterator<Item = &MetadataEntry> {
    self.metadata.iter().filter(|m| m.level == MetadataLevel::Error)
  }

  /// Render the template as-is, diagnostics or not
  pub fn to_template(&self) -> Result<serde_json::Value, StackError> {
    Ok(serde_json::to_value(Template {
      resources: &self.resources,
      outputs: &self.outputs,
    })?)
  }

  /// Render the template, refusing if any construct reported an error
  pub fn synth(&self) -> Result<serde_json::Value, StackError> {
    let errors: Vec<String> = self
      .errors()
      .map(|m| format!("  [{}/{}] {}", self.name, m.path, m.data))
      .collect();
    if !errors.is_empty() {
      return Err(StackError::Validation(errors));
    }
    self.to_template()
  }

  pub fn to_json_string(&self) -> Result<String, StackError> {
    Ok(serde_json::to_string_pretty(&self.synth()?)?)
  }

  pub fn to_yaml_string(&self) -> Result<String, StackError> {
    Ok(serde_yaml::to_string(&self.synth()?)?)
  }
}

fn logical_id(path: &str) -> String {
  let human: String = path
    .split('/')
    .filter(|c| *c != "Resource" && *c != "Default")
    .flat_map(|c| c.chars().filter(|ch| ch.is_ascii_alphanumeric()))
    .collect();
  let digest = Sha256::digest(path.as_bytes());
  let hash = hex::encode_upper(&digest[..4]);
  format!("{}{}", human, hash)
}
