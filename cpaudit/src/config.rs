use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// The set of roles to audit, in the order they are processed
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
  #[serde(rename = "Roles")]
  pub roles: Vec<Role>,
}

/// An IAM role and the region its resources are collected from
///
/// An empty `RoleArn` means the ambient credentials are used as-is
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
  #[serde(rename = "RoleArn", default)]
  pub role_arn: String,

  #[serde(rename = "Region", default)]
  pub region: String,
}

impl Roles {
  pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open config file {}", path.display()))?;
    let reader = BufReader::new(file);
    let roles: Roles =
      serde_json::from_reader(reader).with_context(|| format!("Failed to parse config file {}", path.display()))?;

    Ok(roles)
  }
}
