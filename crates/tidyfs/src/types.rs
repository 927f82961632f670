//! Shared value types for nodes and batch operation results.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// File vs. directory. The only distinction the core ever branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

/// Optional media tag attached by collaborators that parse file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Music,
    Image,
    Video,
    Document,
}

/// Reorganize-by-type bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Documents,
    Photos,
    Videos,
    Music,
    Misc,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Self::Documents,
        Self::Photos,
        Self::Videos,
        Self::Music,
        Self::Misc,
    ];

    /// Classifies a bare extension (no leading dot).
    ///
    /// Matching is case-sensitive against an explicit allow-list, so `PDF`
    /// lands in `Misc` while `PNG` is listed for photos.
    pub fn from_extension(extension: Option<&str>) -> Self {
        match extension {
            Some("pdf" | "docx" | "doc" | "txt" | "text") => Self::Documents,
            Some("jpeg" | "jpg" | "svg" | "png" | "PNG") => Self::Photos,
            Some("mp4" | "mov" | "avi") => Self::Videos,
            Some("wav" | "mp3" | "aac") => Self::Music,
            _ => Self::Misc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::Photos => "photos",
            Self::Videos => "videos",
            Self::Music => "music",
            Self::Misc => "misc",
        }
    }

    /// Folder name used when no override is configured.
    pub fn default_folder(self) -> &'static str {
        match self {
            Self::Documents => "Documents",
            Self::Photos => "Photos",
            Self::Videos => "Videos",
            Self::Music => "Music",
            Self::Misc => "Misc",
        }
    }
}

/// What a batch operation did to each item it touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Move,
    Delete,
}

/// A single item a batch operation could not process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Aggregate result of a batch mutation.
///
/// Failures are per item; one failing file never aborts the batch.
#[derive(Debug, Clone)]
pub struct OperationReport {
    pub kind: OperationKind,
    /// Paths that were moved (their original location) or deleted.
    pub succeeded: Vec<PathBuf>,
    pub failures: Vec<OperationFailure>,
    /// Entries removed by the empty-directory cleanup pass.
    pub pruned: Vec<PathBuf>,
}

impl OperationReport {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            succeeded: Vec::new(),
            failures: Vec::new(),
            pruned: Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn record_failure(&mut self, path: PathBuf, reason: impl fmt::Display) {
        self.failures.push(OperationFailure {
            path,
            reason: reason.to_string(),
        });
    }

    /// Folds another report into this one, keeping this report's kind.
    pub fn absorb(&mut self, other: OperationReport) {
        self.succeeded.extend(other.succeeded);
        self.failures.extend(other.failures);
        self.pruned.extend(other.pruned);
    }
}

impl fmt::Display for OperationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            OperationKind::Move => "Moved",
            OperationKind::Delete => "Deleted",
        };
        let noun = if self.count() == 1 { "file" } else { "files" };
        write!(f, "{verb} {} {noun}", self.count())?;
        if !self.failures.is_empty() {
            write!(f, " ({} failed)", self.failures.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_table_is_case_sensitive() {
        assert_eq!(Category::from_extension(Some("pdf")), Category::Documents);
        assert_eq!(Category::from_extension(Some("PDF")), Category::Misc);
        assert_eq!(Category::from_extension(Some("PNG")), Category::Photos);
        assert_eq!(Category::from_extension(Some("JPG")), Category::Misc);
        assert_eq!(Category::from_extension(Some("mp3")), Category::Music);
        assert_eq!(Category::from_extension(Some("mov")), Category::Videos);
        assert_eq!(Category::from_extension(None), Category::Misc);
    }

    #[test]
    fn report_summary_matches_count() {
        let mut report = OperationReport::new(OperationKind::Move);
        for name in ["a", "b", "c", "d"] {
            report.succeeded.push(PathBuf::from(name));
        }
        assert_eq!(report.to_string(), "Moved 4 files");

        report.record_failure(PathBuf::from("e"), "permission denied");
        assert_eq!(report.to_string(), "Moved 4 files (1 failed)");
    }

    #[test]
    fn report_summary_singular() {
        let mut report = OperationReport::new(OperationKind::Delete);
        report.succeeded.push(PathBuf::from("dup.txt"));
        assert_eq!(report.to_string(), "Deleted 1 file");
    }
}
