//! Compilation target descriptors.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Identifies a target family. The `kind` tag (first token of the spec
/// string, e.g. `"llvm"` or `"cuda"`) is used only as a dispatch key for
/// default tuning policies; the rest of the string is carried opaquely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    raw: String,
    kind: String,
}

impl Target {
    pub fn parse(spec: &str) -> Result<Self> {
        let kind = match spec.split_whitespace().next() {
            Some(kind) => kind.to_string(),
            None => bail!("empty target spec"),
        };
        Ok(Self {
            raw: spec.trim().to_string(),
            kind,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

impl FromStr for Target {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Target::parse(s)
    }
}
