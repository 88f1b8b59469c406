//! Project configuration (`muter.conf.yml`) and the build commands derived
//! from it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MutationError;

pub const CONFIGURATION_FILE_NAME: &str = "muter.conf.yml";
pub const LEGACY_CONFIGURATION_FILE_NAME: &str = "muter.conf.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildSystem {
    Swift,
    Xcodebuild,
    Unknown,
}

impl BuildSystem {
    pub fn from_executable(executable: &str) -> Self {
        let name = Path::new(executable)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(executable);
        match name {
            "swift" => BuildSystem::Swift,
            "xcodebuild" => BuildSystem::Xcodebuild,
            _ => BuildSystem::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuterConfiguration {
    #[serde(default)]
    pub executable: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Files left out of source discovery. Entries with glob characters are
    /// matched as globs against the project-relative path.
    #[serde(default, rename = "exclude")]
    pub excluded_files: Vec<String>,
    /// Extra calls RemoveSideEffects must not remove.
    #[serde(default, rename = "excludeCalls")]
    pub excluded_calls: Vec<String>,
}

impl MuterConfiguration {
    pub fn from_yaml(text: &str) -> Result<Self, MutationError> {
        serde_yaml::from_str(text).map_err(|e| MutationError::configuration(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, MutationError> {
        serde_json::from_str(text).map_err(|e| MutationError::configuration(e.to_string()))
    }

    /// Load and validate a configuration file, picking the format by
    /// extension.
    pub fn load(path: &Path) -> Result<Self, MutationError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            MutationError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let configuration = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text)?,
            _ => Self::from_yaml(&text)?,
        };
        configuration.validate()?;
        Ok(configuration)
    }

    /// The configuration file to use for `project_dir`: `explicit` when
    /// given, else the YAML file, else the legacy JSON file.
    pub fn locate(project_dir: &Path, explicit: Option<&Path>) -> Result<PathBuf, MutationError> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        [CONFIGURATION_FILE_NAME, LEGACY_CONFIGURATION_FILE_NAME]
            .iter()
            .map(|name| project_dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| {
                MutationError::configuration(format!(
                    "no {CONFIGURATION_FILE_NAME} found in {}",
                    project_dir.display()
                ))
            })
    }

    pub fn validate(&self) -> Result<(), MutationError> {
        if self.executable.trim().is_empty() {
            return Err(MutationError::configuration("`executable` must not be empty"));
        }
        if self.build_system() == BuildSystem::Xcodebuild
            && !self.arguments.iter().any(|a| a == "-destination")
        {
            return Err(MutationError::configuration(
                "xcodebuild projects need a `-destination` argument",
            ));
        }
        Ok(())
    }

    pub fn build_system(&self) -> BuildSystem {
        BuildSystem::from_executable(&self.executable)
    }

    /// Arguments compiling the project and its tests without running them.
    /// `None` when the build system is unknown and no separate build exists.
    pub fn build_for_testing_arguments(&self) -> Option<Vec<String>> {
        match self.build_system() {
            BuildSystem::Swift => {
                let mut arguments = replace_action(&self.arguments, "test", "build");
                arguments.push("--build-tests".to_string());
                Some(arguments)
            }
            BuildSystem::Xcodebuild => {
                Some(replace_action(&self.arguments, "test", "build-for-testing"))
            }
            BuildSystem::Unknown => None,
        }
    }

    /// Arguments running the already built tests.
    pub fn test_without_building_arguments(&self) -> Vec<String> {
        match self.build_system() {
            BuildSystem::Swift => {
                let mut arguments = self.arguments.clone();
                arguments.push("--skip-build".to_string());
                arguments
            }
            BuildSystem::Xcodebuild => {
                replace_action(&self.arguments, "test", "test-without-building")
            }
            BuildSystem::Unknown => self.arguments.clone(),
        }
    }

    pub fn coverage_arguments(&self) -> Vec<String> {
        let mut arguments = self.arguments.clone();
        arguments.push("--enable-code-coverage".to_string());
        arguments
    }

    /// Value following `flag` in the arguments.
    pub fn argument_value(&self, flag: &str) -> Option<&str> {
        self.arguments
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.arguments.get(i + 1))
            .map(String::as_str)
    }
}

/// Replace the `from` action with `to`, or put `to` first when absent.
fn replace_action(arguments: &[String], from: &str, to: &str) -> Vec<String> {
    if arguments.iter().any(|a| a == from) {
        arguments
            .iter()
            .map(|a| if a == from { to.to_string() } else { a.clone() })
            .collect()
    } else {
        std::iter::once(to.to_string())
            .chain(arguments.iter().cloned())
            .collect()
    }
}
