use serde::{ser::SerializeMap, Serialize, Serializer};

/// Pseudo parameter resolving to the account the stack is deployed into
pub const ACCOUNT_ID: &str = "AWS::AccountId";
/// Pseudo parameter resolving to the partition (`aws`, `aws-cn`, ...)
pub const PARTITION: &str = "AWS::Partition";

/// A property value inside a CloudFormation template.
///
/// Anything the provisioning engine has to resolve at deploy time (account,
/// partition, attributes of other resources) is kept symbolic here and
/// rendered as the matching intrinsic function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
  Literal(String),
  /// `{"Ref": name}`
  Ref(String),
  /// `{"Fn::GetAtt": [logical_id, attribute]}`
  GetAtt(String, String),
  /// `{"Fn::Join": ["", parts]}`
  Join(Vec<Value>),
}

impl Value {
  pub fn literal(s: impl Into<String>) -> Self {
    Value::Literal(s.into())
  }

  pub fn reference(name: impl Into<String>) -> Self {
    Value::Ref(name.into())
  }

  pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
    Value::GetAtt(logical_id.into(), attribute.into())
  }

  /// Concatenate values with an empty separator.
  ///
  /// Nested joins are flattened, adjacent literals merged and empty literals
  /// dropped, so a join made only of literals comes back as a plain literal.
  pub fn join<I>(parts: I) -> Self
  where
    I: IntoIterator<Item = Value>,
  {
    let mut out: Vec<Value> = Vec::new();
    for part in parts {
      let flat = match part {
        Value::Join(inner) => inner,
        other => vec![other],
      };
      for p in flat {
        if let Value::Literal(s) = &p {
          if s.is_empty() {
            continue;
          }
          if let Some(Value::Literal(prev)) = out.last_mut() {
            prev.push_str(s);
            continue;
          }
        }
        out.push(p);
      }
    }

    match out.len() {
      0 => Value::Literal(String::new()),
      1 => out.remove(0),
      _ => Value::Join(out),
    }
  }

  /// The plain string, if this value needs no resolution.
  pub fn as_literal(&self) -> Option<&str> {
    match self {
      Value::Literal(s) => Some(s),
      _ => None,
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::Literal(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::Literal(s)
  }
}

impl Serialize for Value {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Value::Literal(s) => serializer.serialize_str(s),
      Value::Ref(name) => {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("Ref", name)?;
        map.end()
      }
      Value::GetAtt(id, attr) => {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("Fn::GetAtt", &[id, attr])?;
        map.end()
      }
      Value::Join(parts) => {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("Fn::Join", &("", parts))?;
        map.end()
      }
    }
  }
}
