//! Write a validated [`ProjectOutput`] to disk.
//!
//! Every path is checked before anything is written, so a project with one
//! unsafe or conflicting path leaves the target directory untouched.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use fs_err as fs;
use thiserror::Error;
use tracing::{debug, info};

use crate::extract::ProjectOutput;

#[derive(Debug, Error)]
pub enum MaterializeError {
    /// A `codeFiles` key is absolute or climbs out of the base directory.
    #[error("refusing to write '{path}': {reason}")]
    UnsafePath { path: String, reason: &'static str },

    /// A file would have to be both a file and a directory.
    #[error("cannot write '{path}': {reason}")]
    Conflict { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One file written by [`materialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    /// The `codeFiles` key.
    pub relative: String,
    pub absolute: PathBuf,
    pub bytes: u64,
    /// Whether a file already existed at this path.
    pub overwritten: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub base_dir: PathBuf,
    pub files: Vec<WrittenFile>,
}

impl MaterializeReport {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes).sum()
    }

    pub fn overwritten(&self) -> usize {
        self.files.iter().filter(|f| f.overwritten).count()
    }
}

/// Reject paths that would land outside the base directory.
pub fn check_relative_path(path: &str) -> Result<(), MaterializeError> {
    let unsafe_path = |reason| MaterializeError::UnsafePath {
        path: path.to_string(),
        reason,
    };
    if path.trim().is_empty() {
        return Err(unsafe_path("empty path"));
    }
    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(unsafe_path("contains '..'")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path("absolute path"))
            }
        }
    }
    Ok(())
}

fn normalized(path: &str) -> PathBuf {
    Path::new(path)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

/// Reject layouts that cannot be written in full: a key that is also a
/// parent directory of another key, a parent that exists on disk as a file,
/// or a target that exists on disk as a directory.
fn check_layout(project: &ProjectOutput, base_dir: &Path) -> Result<(), MaterializeError> {
    let files: BTreeSet<PathBuf> = project.files().map(|(path, _)| normalized(path)).collect();
    for (path, _) in project.files() {
        let conflict = |reason: String| MaterializeError::Conflict {
            path: path.to_string(),
            reason,
        };
        let target = normalized(path);
        for parent in target.ancestors().skip(1) {
            if parent.as_os_str().is_empty() {
                break;
            }
            if files.contains(parent) {
                return Err(conflict(format!(
                    "'{}' is also a file in the project",
                    parent.display()
                )));
            }
            if base_dir.join(parent).is_file() {
                return Err(conflict(format!(
                    "'{}' already exists as a file",
                    parent.display()
                )));
            }
        }
        if base_dir.join(&target).is_dir() {
            return Err(conflict("a directory already exists there".to_string()));
        }
    }
    Ok(())
}

/// Write every file in `project` under `base_dir`.
///
/// Intermediate directories are created and existing files are overwritten.
/// Content is written byte for byte.
pub fn materialize(
    project: &ProjectOutput,
    base_dir: &Path,
) -> Result<MaterializeReport, MaterializeError> {
    for (path, _) in project.files() {
        check_relative_path(path)?;
    }
    check_layout(project, base_dir)?;

    fs::create_dir_all(base_dir)?;
    let mut report = MaterializeReport {
        base_dir: base_dir.to_path_buf(),
        files: Vec::with_capacity(project.len()),
    };

    for (relative, content) in project.files() {
        let absolute = base_dir.join(relative);
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)?;
        }
        let overwritten = absolute.is_file();
        fs::write(&absolute, content)?;
        debug!(path = %absolute.display(), bytes = content.len(), overwritten, "wrote file");

        report.files.push(WrittenFile {
            relative: relative.to_string(),
            absolute,
            bytes: content.len() as u64,
            overwritten,
        });
    }

    info!(
        dir = %base_dir.display(),
        files = report.files.len(),
        bytes = report.total_bytes(),
        "project written"
    );
    Ok(report)
}

/// Save the raw model response next to the project for later inspection.
pub fn save_raw_output(path: &Path, text: &str) -> Result<(), MaterializeError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn project(files: &[(&str, &str)]) -> ProjectOutput {
        ProjectOutput {
            file_structure: None,
            code_files: files
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn writes_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("my-app");
        let project = project(&[
            ("package.json", "{}"),
            ("src/components/Button.tsx", "export const Button = () => null;\n"),
        ]);

        let report = materialize(&project, &base).unwrap();
        assert_eq!(report.files.len(), 2);
        assert_eq!(
            std::fs::read_to_string(base.join("src/components/Button.tsx")).unwrap(),
            "export const Button = () => null;\n"
        );
        assert_eq!(
            report.total_bytes(),
            2 + "export const Button = () => null;\n".len() as u64
        );
        assert_eq!(report.overwritten(), 0);
    }

    #[test]
    fn overwrites_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), "old content that is longer").unwrap();

        let report = materialize(&project(&[("a.js", "new")]), dir.path()).unwrap();
        assert!(report.files[0].overwritten);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.js")).unwrap(), "new");
    }

    #[test]
    fn content_is_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let content = "line1\r\n\ttabbed \u{1F600}\n\n";
        materialize(&project(&[("x.txt", content)]), dir.path()).unwrap();
        assert_eq!(std::fs::read(dir.path().join("x.txt")).unwrap(), content.as_bytes());
    }

    #[test]
    fn unsafe_path_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("out");
        let project = project(&[("a.js", "x"), ("../escape.js", "y")]);

        let err = materialize(&project, &base).unwrap_err();
        assert!(matches!(err, MaterializeError::UnsafePath { .. }));
        assert!(!base.exists());
        assert!(!dir.path().join("escape.js").exists());
    }

    #[test]
    fn file_and_directory_with_same_name_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("out");
        let project = project(&[("a", "file"), ("a/b.js", "nested")]);

        let err = materialize(&project, &base).unwrap_err();
        assert!(matches!(err, MaterializeError::Conflict { ref path, .. } if path == "a/b.js"));
        assert!(!base.exists());

        let dotted = self::project(&[("./src", "x"), ("src/main.js", "y")]);
        assert!(matches!(
            materialize(&dotted, &base),
            Err(MaterializeError::Conflict { .. })
        ));
        assert!(!base.exists());
    }

    #[test]
    fn existing_file_in_the_way_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("src"), "not a directory").unwrap();
        let project = project(&[("a.js", "x"), ("src/main.js", "y")]);

        let err = materialize(&project, dir.path()).unwrap_err();
        assert!(matches!(err, MaterializeError::Conflict { .. }));
        assert!(!dir.path().join("a.js").exists());
    }

    #[test]
    fn existing_directory_at_target_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("lib")).unwrap();
        let project = project(&[("a.js", "x"), ("lib", "y")]);

        assert!(matches!(
            materialize(&project, dir.path()),
            Err(MaterializeError::Conflict { .. })
        ));
        assert!(!dir.path().join("a.js").exists());
    }

    #[test]
    fn check_relative_path_cases() {
        assert!(check_relative_path("src/main.rs").is_ok());
        assert!(check_relative_path("./src/main.rs").is_ok());
        assert!(check_relative_path("a/../../b").is_err());
        assert!(check_relative_path("/etc/passwd").is_err());
        assert!(check_relative_path("  ").is_err());
    }

    #[test]
    fn save_raw_output_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("raw.txt");
        save_raw_output(&path, "the whole response").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "the whole response");
    }
}
