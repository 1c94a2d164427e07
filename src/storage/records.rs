use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Coarse grouping of files by extension, used by the host to label results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Applications")]
    Applications,
    #[serde(rename = "PDF Documents")]
    PdfDocuments,
    #[serde(rename = "Documents")]
    Documents,
    #[serde(rename = "Images")]
    Images,
    #[serde(rename = "Spreadsheets")]
    Spreadsheets,
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    /// Derive a category from an extension such as `.pdf` or `PDF`
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.trim_start_matches('.').to_lowercase();
        match ext.as_str() {
            "app" | "exe" | "dmg" => Category::Applications,
            "pdf" => Category::PdfDocuments,
            "doc" | "docx" | "txt" | "rtf" | "md" | "markdown" => Category::Documents,
            "js" | "ts" | "jsx" | "tsx" | "py" | "java" | "cpp" | "html" | "css" | "json"
            | "xml" | "yaml" | "yml" => Category::Documents,
            "jpg" | "jpeg" | "png" | "gif" | "svg" | "webp" => Category::Images,
            "xlsx" | "xls" | "csv" => Category::Spreadsheets,
            _ => Category::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Applications => "Applications",
            Category::PdfDocuments => "PDF Documents",
            Category::Documents => "Documents",
            Category::Images => "Images",
            Category::Spreadsheets => "Spreadsheets",
            Category::Other => "Other",
        }
    }
}

/// Metadata row for one indexed file. Exactly one exists per distinct `path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: u64,
    pub path: String,
    pub name: String,
    /// Extension with its leading dot (`.txt`), empty when the file has none
    pub extension: String,
    pub category: Category,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fields of a [`FileRecord`] that come from the file system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub path: String,
    pub name: String,
    pub extension: String,
    pub size: u64,
}

impl FileMeta {
    pub fn from_path(path: &Path, size: u64) -> Self {
        Self {
            path: path.to_string_lossy().into_owned(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension: dotted_extension(path),
            size,
        }
    }
}

/// Extension of `path` including the leading dot, or an empty string.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Vector representation of one file, replaced on every re-index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub file_id: u64,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A path the user opened from the results list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentRecord {
    pub path: String,
    pub last_clicked: DateTime<Utc>,
}

/// `now`, or one microsecond past `previous` when the clock has not moved.
pub(crate) fn advance_timestamp(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_category_from_extension() {
        assert_eq!(Category::from_extension(".pdf"), Category::PdfDocuments);
        assert_eq!(Category::from_extension("PDF"), Category::PdfDocuments);
        assert_eq!(Category::from_extension(".txt"), Category::Documents);
        assert_eq!(Category::from_extension(".py"), Category::Documents);
        assert_eq!(Category::from_extension(".png"), Category::Images);
        assert_eq!(Category::from_extension(".csv"), Category::Spreadsheets);
        assert_eq!(Category::from_extension(".dmg"), Category::Applications);
        assert_eq!(Category::from_extension(".mp4"), Category::Other);
        assert_eq!(Category::from_extension(""), Category::Other);
    }

    #[test]
    fn test_category_serializes_with_display_names() {
        let json = serde_json::to_string(&Category::PdfDocuments).unwrap();
        assert_eq!(json, "\"PDF Documents\"");
        assert_eq!(Category::PdfDocuments.as_str(), "PDF Documents");
    }

    #[test]
    fn test_file_meta_from_path() {
        let meta = FileMeta::from_path(&PathBuf::from("/tmp/notes/notes.txt"), 11);
        assert_eq!(meta.name, "notes.txt");
        assert_eq!(meta.extension, ".txt");
        assert_eq!(meta.size, 11);

        let bare = FileMeta::from_path(&PathBuf::from("/tmp/Makefile"), 0);
        assert_eq!(bare.extension, "");
    }

    #[test]
    fn test_advance_timestamp_is_strictly_increasing() {
        let previous = Utc::now();
        assert!(advance_timestamp(previous, previous) > previous);
        assert!(advance_timestamp(previous, previous - Duration::seconds(5)) > previous);

        let later = previous + Duration::seconds(1);
        assert_eq!(advance_timestamp(previous, later), later);
    }
}
