use std::collections::BTreeMap;
use std::path::Path;

use common::PatternSet;
use serde::Deserialize;

use crate::error::{Error, Result};

/// One archive to patch: the file name of the jar in the distribution, the
/// name it may carry in an installed application, and the entries to swap.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    pub alias: String,
    pub classes: Vec<String>,
}

impl GroupSpec {
    pub fn patterns(&self) -> Result<PatternSet> {
        PatternSet::compile(&self.classes).map_err(|err| Error::Configuration(format!("{err:#}")))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchConfig {
    pub groups: BTreeMap<String, GroupSpec>,
}

impl PatchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::Configuration(format!("unable to read {}: {err}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let groups: BTreeMap<String, GroupSpec> =
            toml::from_str(text).map_err(|err| Error::Configuration(err.to_string()))?;

        let config = Self { groups };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, group) in &self.groups {
            if !is_file_name(name) {
                return Err(Error::Configuration(format!(
                    "group '{name}' is not a plain archive file name"
                )));
            }

            if !is_file_name(&group.alias) {
                return Err(Error::Configuration(format!(
                    "alias '{}' of group '{name}' is not a plain archive file name",
                    group.alias
                )));
            }

            if group.classes.iter().any(|p| p.is_empty()) {
                return Err(Error::Configuration(format!(
                    "group '{name}' contains an empty class pattern"
                )));
            }

            group.patterns()?;
        }

        Ok(())
    }
}

fn is_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
