use std::fs;
use std::path::{Path, PathBuf};

/// Only Outlook message files are accepted for upload.
pub const ACCEPTED_EXTENSION: &str = "msg";

pub fn has_accepted_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(ACCEPTED_EXTENSION))
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct PendingFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

/// What happened to a batch of candidate files: how many were queued and
/// which names were turned away. All-rejected means no upload may happen.
#[derive(Debug, Default)]
pub struct IntakeOutcome {
    pub accepted: usize,
    pub rejected: Vec<String>,
}

/// Ordered set of locally chosen files awaiting one multipart submission.
#[derive(Debug, Default)]
pub struct PendingUploads {
    files: Vec<PendingFile>,
}

impl PendingUploads {
    /// Filter candidates to the accepted extension and queue the survivors.
    /// Files already queued are skipped silently.
    pub fn add_candidates(&mut self, paths: Vec<PathBuf>) -> IntakeOutcome {
        let mut outcome = IntakeOutcome::default();

        for path in paths {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            if !has_accepted_extension(&name) {
                outcome.rejected.push(name);
                continue;
            }
            if self.files.iter().any(|f| f.path == path) {
                continue;
            }

            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            self.files.push(PendingFile { path, name, size });
            outcome.accepted += 1;
        }

        outcome
    }

    pub fn remove(&mut self, index: usize) -> Option<PendingFile> {
        if index < self.files.len() {
            Some(self.files.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn files(&self) -> &[PendingFile] {
        &self.files
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
