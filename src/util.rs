/// Collection of small utilities used all over the place
use chrono::DateTime;
use std::{fs, path::Path, path::PathBuf};

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if size == 0.0 {
        return "0 B".to_string();
    }

    format!("{:.2} {}", size, UNITS[unit])
}

// The conversion service reports message dates as RFC 3339 strings. Anything
// else is shown as-is rather than dropped.
pub fn format_date(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// List a directory for the file picker: ".." first (when there is a parent),
/// then directories, then files, each group sorted case-insensitively.
pub fn list_dir(dir: &Path) -> Vec<DirEntryInfo> {
    let mut items = vec![];

    if let Some(parent) = dir.parent() {
        items.push(DirEntryInfo {
            name: "..".to_string(),
            path: parent.to_path_buf(),
            is_dir: true,
        });
    }

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let name = entry
                .file_name()
                .into_string()
                .unwrap_or_else(|_| "???".to_string());

            let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);

            items.push(DirEntryInfo {
                name,
                path: entry.path(),
                is_dir,
            });
        }
    }

    // Sort with custom comparator
    items.sort_by(|a, b| {
        match (a.name.as_str(), b.name.as_str()) {
            // ".." always goes first
            ("..", _) => std::cmp::Ordering::Less,
            (_, "..") => std::cmp::Ordering::Greater,
            // Directories before files
            (_, _) if a.is_dir == b.is_dir => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            (_, _) if a.is_dir => std::cmp::Ordering::Less,
            _ => std::cmp::Ordering::Greater,
        }
    });

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_format_date_rfc3339() {
        assert_eq!(format_date("2010-04-19T04:34:14+00:00"), "2010-04-19 04:34");
    }

    #[test]
    fn test_format_date_passthrough() {
        assert_eq!(format_date("19 Apr 2010"), "19 Apr 2010");
    }
}
