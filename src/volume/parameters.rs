//! Storage class parameters read by the provisioner itself.
//! `gidMin` and `gidMax` belong to the GID allocator and are left alone.

use std::collections::BTreeMap;

use crate::error::ProvisionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassParameters {
    pub gid_allocate: bool,
}

impl Default for ClassParameters {
    fn default() -> Self {
        Self { gid_allocate: true }
    }
}

impl ClassParameters {
    pub fn parse(parameters: &BTreeMap<String, String>) -> Result<Self, ProvisionError> {
        let mut parsed = ClassParameters::default();

        for (key, value) in parameters {
            match key.to_lowercase().as_str() {
                "gidmin" | "gidmax" => {}
                "gidallocate" => {
                    parsed.gid_allocate =
                        parse_bool(value).ok_or_else(|| ProvisionError::InvalidParameterValue {
                            key: key.clone(),
                            value: value.clone(),
                        })?;
                }
                _ => {}
            }
        }

        Ok(parsed)
    }
}

/// Boolean spellings accepted in storage class parameters
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
