//! Where documents are read from and where their outputs go.

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("input path does not exist: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("input path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("output {} lies inside input {}", output.display(), input.display())]
    OutputInsideInput { input: PathBuf, output: PathBuf },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

impl LayoutError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> LayoutError + '_ {
        move |source| LayoutError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The input tree and the `edit/` and `diff/` trees mirroring it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub edit_root: PathBuf,
    pub diff_root: PathBuf,
}

/// Paths belonging to one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPaths {
    /// Relative to the input root
    pub relative: PathBuf,
    pub original: PathBuf,
    pub edited: PathBuf,
    pub diff: PathBuf,
}

impl OutputLayout {
    /// Resolve the output root for `input`.
    ///
    /// Without an explicit output, an input directory named `input` writes
    /// to a sibling `output`, anything else to a sibling `<name>_pecked`.
    pub fn resolve(input: &Path, output: Option<&Path>) -> Result<Self, LayoutError> {
        if !input.exists() {
            return Err(LayoutError::InputMissing(input.to_path_buf()));
        }
        if !input.is_dir() {
            return Err(LayoutError::NotADirectory(input.to_path_buf()));
        }
        let input_root = fs::canonicalize(input).map_err(LayoutError::io(input))?;

        let output_root = match output {
            Some(output) => absolute(output).map_err(LayoutError::io(output))?,
            None => default_output(&input_root),
        };
        if output_root.starts_with(&input_root) {
            return Err(LayoutError::OutputInsideInput {
                input: input_root,
                output: output_root,
            });
        }

        Ok(Self {
            edit_root: output_root.join("edit"),
            diff_root: output_root.join("diff"),
            input_root,
            output_root,
        })
    }

    /// Documents under the input root, in file-name order.
    pub fn discover(
        &self,
        is_document: impl Fn(&str) -> bool,
    ) -> Result<Vec<DocumentPaths>, LayoutError> {
        let mut documents = Vec::new();
        for entry in WalkDir::new(&self.input_root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let selected = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(&is_document);
            if !selected {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.input_root)
                .unwrap_or(entry.path())
                .to_path_buf();
            documents.push(self.document(relative));
        }
        Ok(documents)
    }

    pub fn document(&self, relative: PathBuf) -> DocumentPaths {
        DocumentPaths {
            original: self.input_root.join(&relative),
            edited: self.edit_root.join(&relative),
            diff: self.diff_root.join(&relative),
            relative,
        }
    }

    /// Copy the whole input tree into `edit/`, so the edited tree stays
    /// buildable with its figures and bibliographies.
    pub fn copy_tree(&self) -> Result<usize, LayoutError> {
        let mut copied = 0;
        for entry in WalkDir::new(&self.input_root).sort_by_file_name() {
            let entry = entry?;
            let relative = entry
                .path()
                .strip_prefix(&self.input_root)
                .unwrap_or(entry.path());
            let target = self.edit_root.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(LayoutError::io(&target))?;
            } else if entry.file_type().is_file() {
                fs::copy(entry.path(), &target).map_err(LayoutError::io(&target))?;
                copied += 1;
            }
        }
        fs::create_dir_all(&self.diff_root).map_err(LayoutError::io(&self.diff_root))?;
        tracing::debug!(files = copied, root = %self.edit_root.display(), "copied input tree");
        Ok(copied)
    }
}

fn default_output(input_root: &Path) -> PathBuf {
    let name = input_root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sibling = if name == "input" {
        "output".to_string()
    } else {
        format!("{name}_pecked")
    };
    match input_root.parent() {
        Some(parent) => parent.join(sibling),
        None => PathBuf::from(sibling),
    }
}

/// Absolute form of a path that may not exist yet: `..` is folded
/// lexically, then the longest existing ancestor is canonicalized.
fn absolute(path: &Path) -> io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normal = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                normal.pop();
            }
            Component::CurDir => {}
            other => normal.push(other),
        }
    }

    let mut existing = normal.as_path();
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name);
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = fs::canonicalize(existing)?;
    resolved.extend(rest.iter().rev());
    Ok(resolved)
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the previous file is left untouched.
pub fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory")
    })?;
    fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
