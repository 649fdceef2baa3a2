//! GitHub naming rules for repository owners and names.

use thiserror::Error;

/// Longest user or organization name GitHub accepts
pub const MAX_OWNER_LENGTH: usize = 39;

// Message texts are matched verbatim by existing tooling, typos included.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("Invalid Github Repository Owner \"{0}\". Must only contain alphanumeric characters or hyphens, cannot have multiple consecutive hyphens, cannot begin or end with a hypen and maximum lenght is 39 characters.")]
  InvalidOwner(String),
  #[error("Invalid Github Repository Name \"{0}\". May not be empty string.")]
  InvalidRepo(String),
}

/// Check a user or organization name.
///
/// Accepts 1 to 39 ASCII alphanumerics or hyphens, with no hyphen at either
/// end and never two in a row.
pub fn validate_owner(owner: &str) -> Result<(), ValidationError> {
  let invalid = || ValidationError::InvalidOwner(owner.to_string());

  if owner.is_empty() || owner.len() > MAX_OWNER_LENGTH {
    return Err(invalid());
  }
  if owner.starts_with('-') || owner.ends_with('-') || owner.contains("--") {
    return Err(invalid());
  }
  if !owner.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
    return Err(invalid());
  }

  Ok(())
}

pub fn validate_repo(repo: &str) -> Result<(), ValidationError> {
  if repo.is_empty() {
    return Err(ValidationError::InvalidRepo(repo.to_string()));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_valid_owners() {
    let longest = "x".repeat(39);
    for owner in ["octo-org", "a", "A1", "a-b-c", "0xdeadbeef", longest.as_str()] {
      assert_eq!(validate_owner(owner), Ok(()), "{}", owner);
    }
  }

  #[test]
  fn rejects_invalid_owners() {
    let too_long = "x".repeat(40);
    for owner in [
      "",
      "-octo",
      "octo-",
      "octo--org",
      "octo_org",
      "octo.org",
      "invalid/@owner--",
      "ö",
      too_long.as_str(),
    ] {
      assert_eq!(
        validate_owner(owner),
        Err(ValidationError::InvalidOwner(owner.to_string())),
        "{}",
        owner
      );
    }
  }

  #[test]
  fn owner_message_is_verbatim() {
    let err = validate_owner("invalid/@owner--").unwrap_err();
    assert_eq!(
      err.to_string(),
      "Invalid Github Repository Owner \"invalid/@owner--\". Must only contain alphanumeric characters or hyphens, cannot have multiple consecutive hyphens, cannot begin or end with a hypen and maximum lenght is 39 characters."
    );
  }

  #[test]
  fn repo_must_not_be_empty() {
    assert_eq!(validate_repo("octo-repo"), Ok(()));
    assert_eq!(validate_repo("."), Ok(()));
    let err = validate_repo("").unwrap_err();
    assert_eq!(err.to_string(), "Invalid Github Repository Name \"\". May not be empty string.");
  }
}
