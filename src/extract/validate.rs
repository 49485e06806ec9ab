//! Parse and shape-check the extracted JSON candidate.
//!
//! This is the only place the dynamic `serde_json::Value` is inspected.
//! Everything downstream works with the typed [`ProjectOutput`].

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::extract::error::GenerationError;

/// A validated set of generated files.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOutput {
    /// Advisory layout description, in whatever shape the model produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_structure: Option<Value>,
    /// Relative path to verbatim file content.
    pub code_files: BTreeMap<String, String>,
}

impl ProjectOutput {
    /// Number of files to write.
    pub fn len(&self) -> usize {
        self.code_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code_files.is_empty()
    }

    /// Iterate `(path, content)` pairs in path order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.code_files
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_str()))
    }

    /// Paths in `codeFiles` that `fileStructure` does not mention.
    ///
    /// Only meaningful when `fileStructure` is an array of strings; any other
    /// shape yields an empty list. Leading `/` and `./` are ignored when
    /// comparing. Never used to reject a project.
    pub fn undeclared_files(&self) -> Vec<&str> {
        let Some(Value::Array(declared)) = &self.file_structure else {
            return Vec::new();
        };
        let declared: Vec<&str> = declared
            .iter()
            .filter_map(Value::as_str)
            .map(normalize_declared)
            .collect();
        if declared.is_empty() {
            return Vec::new();
        }
        self.code_files
            .keys()
            .map(String::as_str)
            .filter(|path| !declared.contains(&normalize_declared(path)))
            .collect()
    }
}

fn normalize_declared(path: &str) -> &str {
    let path = path.trim();
    let path = path.strip_prefix("./").unwrap_or(path);
    path.trim_start_matches('/')
}

/// Parse `candidate` and check the `codeFiles` contract.
///
/// `raw` is the complete model response; it is attached to any failure so
/// the caller can show the human what the model actually said.
///
/// # Examples
///
/// ```
/// use llm_scaffold::extract::validate;
///
/// let raw = r#"{"codeFiles":{"a.js":"x"}}"#;
/// let project = validate(raw, raw).unwrap();
/// assert_eq!(project.code_files["a.js"], "x");
/// ```
pub fn validate(candidate: &str, raw: &str) -> Result<ProjectOutput, GenerationError> {
    let value: Value = serde_json::from_str(candidate).map_err(|e| GenerationError::Parse {
        reason: e.to_string(),
        raw: raw.to_string(),
    })?;

    let schema_error = |reason: String| GenerationError::Schema {
        reason,
        raw: raw.to_string(),
    };

    let mut root = match value {
        Value::Object(root) => root,
        other => {
            return Err(schema_error(format!(
                "top-level JSON is {}, expected an object",
                json_type_name(&other)
            )))
        }
    };

    let files = match root.remove("codeFiles") {
        Some(Value::Object(files)) => files,
        Some(other) => {
            return Err(schema_error(format!(
                "codeFiles is {}, expected an object",
                json_type_name(&other)
            )))
        }
        None => return Err(schema_error("codeFiles is missing".to_string())),
    };

    let mut code_files = BTreeMap::new();
    for (path, content) in files {
        if path.is_empty() {
            return Err(schema_error("codeFiles contains an empty path".to_string()));
        }
        match content {
            Value::String(content) => {
                code_files.insert(path, content);
            }
            other => {
                return Err(schema_error(format!(
                    "codeFiles[\"{}\"] is {}, expected a string",
                    path,
                    json_type_name(&other)
                )))
            }
        }
    }

    Ok(ProjectOutput {
        file_structure: root.remove("fileStructure"),
        code_files,
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
