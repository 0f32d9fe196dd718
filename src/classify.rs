//! Classification rules for bucketing files.
//!
//! A file is bucketed by its lowercased extension, the year and month it was
//! last modified, and optionally a size band. These rules are pure: they look
//! only at the values handed to them and never touch the filesystem.
//!
//! # Examples
//!
//! ```
//! use dirbucket::classify::{SizeCategory, extension_segment};
//! use std::path::Path;
//!
//! assert_eq!(extension_segment(Path::new("photo.JPG")), "jpg");
//! assert_eq!(extension_segment(Path::new("Makefile")), "no_extension");
//! assert_eq!(SizeCategory::from_bytes(15 * 1024 * 1024), SizeCategory::Medium);
//! ```

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Folder segment used for files without an extension.
pub const NO_EXTENSION: &str = "no_extension";
/// Year segment used when the modification time cannot be read.
pub const UNKNOWN_YEAR: &str = "Unknown_Year";
/// Month segment used when the modification time cannot be read.
pub const UNKNOWN_MONTH: &str = "Unknown_Month";

const MIB: u64 = 1024 * 1024;

/// Size band of a file, appended as an extra folder level when sorting by size.
///
/// Each band includes its upper bound: a file of exactly 10 MiB is `Small`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SizeCategory {
    /// Up to 10 MiB.
    Small,
    /// Up to 100 MiB.
    Medium,
    /// Up to 1000 MiB.
    Large,
    /// Anything above 1000 MiB.
    VeryLarge,
}

impl SizeCategory {
    /// Buckets a size in bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use dirbucket::classify::SizeCategory;
    ///
    /// assert_eq!(SizeCategory::from_bytes(0), SizeCategory::Small);
    /// assert_eq!(SizeCategory::from_bytes(1500 * 1024 * 1024), SizeCategory::VeryLarge);
    /// ```
    pub fn from_bytes(size: u64) -> Self {
        if size <= 10 * MIB {
            SizeCategory::Small
        } else if size <= 100 * MIB {
            SizeCategory::Medium
        } else if size <= 1000 * MIB {
            SizeCategory::Large
        } else {
            SizeCategory::VeryLarge
        }
    }

    /// Returns the folder name for this size band.
    pub fn dir_name(&self) -> &'static str {
        match self {
            SizeCategory::Small => "Small",
            SizeCategory::Medium => "Medium",
            SizeCategory::Large => "Large",
            SizeCategory::VeryLarge => "Very_Large",
        }
    }
}

/// Year and month folder segments derived from a modification time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DateBucket {
    /// Four-digit year, or `Unknown_Year`.
    pub year: String,
    /// Full English month name, or `Unknown_Month`.
    pub month: String,
}

impl DateBucket {
    /// Buckets a modification time in local time.
    ///
    /// `None` (the timestamp could not be read) yields the unknown sentinels.
    pub fn from_modified(modified: Option<SystemTime>) -> Self {
        match modified {
            Some(time) => {
                let local: DateTime<Local> = time.into();
                Self {
                    year: local.format("%Y").to_string(),
                    month: local.format("%B").to_string(),
                }
            }
            None => Self::unknown(),
        }
    }

    /// The sentinel bucket for files whose timestamp is unavailable.
    pub fn unknown() -> Self {
        Self {
            year: UNKNOWN_YEAR.to_string(),
            month: UNKNOWN_MONTH.to_string(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.year != UNKNOWN_YEAR
    }
}

/// Everything that decides where a file is bucketed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationKey {
    /// Extension folder segment, without the dot.
    pub extension: String,
    /// Year/month folder segments.
    pub date: DateBucket,
    /// Size band, present only when sorting by size.
    pub size: Option<SizeCategory>,
}

impl ClassificationKey {
    /// Builds the key for a file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path (or bare name) of the file; only the name is inspected
    /// * `modified` - Last modification time, if it could be read
    /// * `size` - File size in bytes when sorting by size, `None` otherwise
    pub fn new(path: &Path, modified: Option<SystemTime>, size: Option<u64>) -> Self {
        Self {
            extension: extension_segment(path),
            date: DateBucket::from_modified(modified),
            size: size.map(SizeCategory::from_bytes),
        }
    }

    /// Returns `root/<extension>/<year>/<month>[/<size>]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dirbucket::classify::ClassificationKey;
    /// use std::path::Path;
    ///
    /// let key = ClassificationKey::new(Path::new("notes"), None, Some(42));
    /// assert_eq!(
    ///     key.destination_dir(Path::new("/data")),
    ///     Path::new("/data/no_extension/Unknown_Year/Unknown_Month/Small")
    /// );
    /// ```
    pub fn destination_dir(&self, root: &Path) -> PathBuf {
        let mut dir = root
            .join(&self.extension)
            .join(&self.date.year)
            .join(&self.date.month);
        if let Some(size) = self.size {
            dir.push(size.dir_name());
        }
        dir
    }
}

/// Returns the extension folder segment for a file: its lowercased extension
/// without the dot, or `no_extension`.
///
/// Dotfiles such as `.bashrc` and names ending in a bare dot have no extension.
pub fn extension_segment(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| NO_EXTENSION.to_string())
}

/// Inserts a collision counter before the extension: `report.txt` becomes
/// `report_1.txt`, `README` becomes `README_1`.
pub fn suffixed_file_name(file_name: &str, counter: u32) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());

    match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, counter, ext.to_string_lossy()),
        None => format!("{}_{}", stem, counter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local_time(year: i32, month: u32, day: u32) -> SystemTime {
        Local
            .with_ymd_and_hms(year, month, day, 12, 0, 0)
            .single()
            .expect("unambiguous local time")
            .into()
    }

    #[test]
    fn test_size_category_boundaries() {
        assert_eq!(SizeCategory::from_bytes(10 * MIB), SizeCategory::Small);
        assert_eq!(SizeCategory::from_bytes(10 * MIB + 1), SizeCategory::Medium);
        assert_eq!(SizeCategory::from_bytes(15 * MIB), SizeCategory::Medium);
        assert_eq!(SizeCategory::from_bytes(100 * MIB), SizeCategory::Medium);
        assert_eq!(SizeCategory::from_bytes(100 * MIB + 1), SizeCategory::Large);
        assert_eq!(SizeCategory::from_bytes(1000 * MIB), SizeCategory::Large);
        assert_eq!(SizeCategory::from_bytes(1500 * MIB), SizeCategory::VeryLarge);
    }

    #[test]
    fn test_size_category_dir_names() {
        assert_eq!(SizeCategory::Small.dir_name(), "Small");
        assert_eq!(SizeCategory::Medium.dir_name(), "Medium");
        assert_eq!(SizeCategory::Large.dir_name(), "Large");
        assert_eq!(SizeCategory::VeryLarge.dir_name(), "Very_Large");
    }

    #[test]
    fn test_extension_segment() {
        assert_eq!(extension_segment(Path::new("photo.jpg")), "jpg");
        assert_eq!(extension_segment(Path::new("PHOTO.JPG")), "jpg");
        assert_eq!(extension_segment(Path::new("archive.tar.gz")), "gz");
        assert_eq!(extension_segment(Path::new("Makefile")), NO_EXTENSION);
        assert_eq!(extension_segment(Path::new(".bashrc")), NO_EXTENSION);
        assert_eq!(extension_segment(Path::new("trailing.")), NO_EXTENSION);
    }

    #[test]
    fn test_date_bucket_from_modified() {
        let bucket = DateBucket::from_modified(Some(local_time(2023, 3, 15)));
        assert_eq!(bucket.year, "2023");
        assert_eq!(bucket.month, "March");
        assert!(bucket.is_known());
    }

    #[test]
    fn test_date_bucket_unknown() {
        let bucket = DateBucket::from_modified(None);
        assert_eq!(bucket.year, UNKNOWN_YEAR);
        assert_eq!(bucket.month, UNKNOWN_MONTH);
        assert!(!bucket.is_known());
    }

    #[test]
    fn test_destination_dir_without_size() {
        let key = ClassificationKey::new(Path::new("holiday.jpg"), Some(local_time(2023, 3, 1)), None);
        assert_eq!(
            key.destination_dir(Path::new("/root")),
            PathBuf::from("/root/jpg/2023/March")
        );
    }

    #[test]
    fn test_destination_dir_with_size() {
        let key = ClassificationKey::new(
            Path::new("movie.mkv"),
            Some(local_time(2021, 12, 24)),
            Some(1500 * MIB),
        );
        assert_eq!(
            key.destination_dir(Path::new("/root")),
            PathBuf::from("/root/mkv/2021/December/Very_Large")
        );
    }

    #[test]
    fn test_suffixed_file_name() {
        assert_eq!(suffixed_file_name("report.txt", 1), "report_1.txt");
        assert_eq!(suffixed_file_name("report.txt", 2), "report_2.txt");
        assert_eq!(suffixed_file_name("archive.tar.gz", 1), "archive.tar_1.gz");
        assert_eq!(suffixed_file_name("README", 3), "README_3");
        assert_eq!(suffixed_file_name(".bashrc", 1), ".bashrc_1");
    }
}
