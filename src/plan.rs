use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MutationError;
use crate::mapping::SchemataMutationMapping;

pub const TEST_PLAN_FILE_NAME: &str = "muter-mappings.json";

/// Everything the test phase needs from a mutate-only run: where the
/// rewritten project lives, its coverage and the schemata embedded in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPlan {
    pub mutated_project_path: PathBuf,
    pub project_coverage: i32,
    pub mappings: Vec<SchemataMutationMapping>,
}

impl TestPlan {
    pub fn write(&self, path: &Path) -> Result<(), MutationError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| plan_error(path, e))?;
        std::fs::write(path, json).map_err(|e| plan_error(path, e))
    }

    pub fn load(path: &Path) -> Result<TestPlan, MutationError> {
        let json = std::fs::read_to_string(path).map_err(|e| plan_error(path, e))?;
        serde_json::from_str(&json).map_err(|e| plan_error(path, e))
    }
}

fn plan_error(path: &Path, err: impl std::fmt::Display) -> MutationError {
    MutationError::TestPlan {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
