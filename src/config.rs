//! Configuration for organize runs.
//!
//! Settings are loaded from TOML and cover three areas:
//! - Organize defaults (sort by size)
//! - Undo policy (keep journal entries whose restore failed)
//! - File filters: exact names, globs, extensions, regexes, and include
//!   (whitelist) patterns that override the excludes
//!
//! # Configuration File Format
//!
//! Every section is optional:
//!
//! ```toml
//! [organize]
//! sort_by_size = false
//!
//! [undo]
//! retain_failed = false
//!
//! [filters]
//! enable_hidden_dirs = false
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.tmp", "node_modules/**"]
//! extensions = ["bak", "tmp"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".dirbucketrc.toml";

/// Errors that can occur during configuration loading and filtering.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    ConfigInvalid(String),
    /// Invalid glob pattern provided.
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// IO error while reading configuration.
    IoError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::InvalidGlobPattern(pattern) => {
                write!(
                    f,
                    "Invalid glob pattern '{}': expected *.ext or dir/**",
                    pattern
                )
            }
            ConfigError::InvalidRegexPattern { pattern, reason } => {
                write!(f, "Invalid regex pattern '{}': {}", pattern, reason)
            }
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub organize: OrganizeSettings,

    #[serde(default)]
    pub undo: UndoSettings,

    #[serde(default)]
    pub filters: FilterRules,
}

/// Defaults for organize runs. Command-line flags can only switch these on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizeSettings {
    /// Append a size band (`Small`, `Medium`, ...) below the month folder.
    #[serde(default)]
    pub sort_by_size: bool,
}

/// Undo policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UndoSettings {
    /// Keep journal entries whose restore failed, so undo can be retried.
    /// When false the journal is cleared after every undo attempt.
    #[serde(default)]
    pub retain_failed: bool,
}

/// File filter rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether the walk descends into hidden directories (`.git`, `.cache`,
    /// ...). Hidden files in visited directories are always organized.
    /// Defaults to false.
    #[serde(default)]
    pub enable_hidden_dirs: bool,

    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

/// Rules for excluding files from organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to exclude, matched against the path relative to the
    /// organize root (e.g., "*.tmp", "node_modules/**").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude (e.g., "bak", "tmp", "log").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns to exclude, matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    /// Glob patterns that override exclude rules.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Config {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.dirbucketrc.toml` in the current directory
    /// 3. Look for `~/.config/dirbucket/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any discovered file is not valid TOML.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("dirbucket")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if file does not exist.
    /// Returns `ConfigError::ConfigInvalid` if TOML parsing fails.
    /// Returns `ConfigError::IoError` if file cannot be read.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Compile the filter rules into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

/// Filter rules with every pattern compiled up front, so matching a file
/// never reparses a pattern.
///
/// The default accepts every file and skips hidden directories.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilters {
    enable_hidden_dirs: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    /// Create compiled filters from filter rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any glob or regex patterns are invalid.
    pub fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_patterns = compile_globs(&rules.exclude.patterns)?;
        let include_patterns = compile_globs(&rules.include.patterns)?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_dirs: rules.enable_hidden_dirs,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        })
    }

    /// Check if a file should be organized.
    ///
    /// `relative_path` is the file's path relative to the organize root.
    /// Checks are performed in this order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Exact filename match - if matched, exclude
    /// 3. File extension match - if matched, exclude
    /// 4. Glob pattern match - if matched, exclude
    /// 5. Regex pattern match - if matched, exclude
    /// 6. Default: include
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.matches_include_patterns(relative_path) {
            return true;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.matches_exclude_patterns(relative_path) {
            return false;
        }

        !self.matches_exclude_regex(&file_name)
    }

    /// Check if the walk should descend into a directory with this name.
    ///
    /// Hidden directories (`.git`, `.cache`, ...) are skipped unless
    /// `enable_hidden_dirs` is set.
    pub fn should_descend(&self, dir_name: &str) -> bool {
        self.enable_hidden_dirs || !dir_name.starts_with('.')
    }

    fn matches_include_patterns(&self, path: &Path) -> bool {
        self.include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path))
    }

    fn matches_exclude_patterns(&self, path: &Path) -> bool {
        self.exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path))
    }

    fn matches_exclude_regex(&self, file_name: &str) -> bool {
        self.exclude_regexes
            .iter()
            .any(|regex| regex.is_match(file_name))
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules_with_exclude(exclude: ExcludeRules) -> FilterRules {
        FilterRules {
            enable_hidden_dirs: true,
            exclude,
            include: IncludeRules::default(),
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.organize.sort_by_size);
        assert!(!config.undo.retain_failed);
        assert!(!config.filters.enable_hidden_dirs);
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml(
            r#"
            [organize]
            sort_by_size = true

            [undo]
            retain_failed = true

            [filters]
            enable_hidden_dirs = true

            [filters.exclude]
            extensions = ["bak"]
            "#,
        )
        .expect("Config should parse");

        assert!(config.organize.sort_by_size);
        assert!(config.undo.retain_failed);
        assert!(config.filters.enable_hidden_dirs);
        assert_eq!(config.filters.exclude.extensions, vec!["bak".to_string()]);
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = Config::from_toml("").expect("Empty config should parse");
        assert!(!config.organize.sort_by_size);
        assert!(config.filters.exclude.patterns.is_empty());
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::from_toml("[organize]\nsort_by_size = \"yes\"");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = Config::load(Some(Path::new("/non/existent/dirbucket.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_hidden_files_included_by_default() {
        let compiled = CompiledFilters::default();

        assert!(compiled.should_include(Path::new(".env")));
        assert!(compiled.should_include(Path::new("sub/.gitignore")));
        assert!(compiled.should_include(Path::new("photo.jpg")));
    }

    #[test]
    fn test_hidden_directories_skipped_by_default() {
        let compiled = CompiledFilters::default();
        assert!(!compiled.should_descend(".git"));
        assert!(compiled.should_descend("photos"));

        let enabled = CompiledFilters::new(&rules_with_exclude(ExcludeRules::default())).unwrap();
        assert!(enabled.should_descend(".git"));
    }

    #[test]
    fn test_exclude_exact_filename() {
        let compiled = CompiledFilters::new(&rules_with_exclude(ExcludeRules {
            filenames: vec!["Thumbs.db".to_string(), ".DS_Store".to_string()],
            ..Default::default()
        }))
        .unwrap();

        assert!(!compiled.should_include(Path::new("Thumbs.db")));
        assert!(!compiled.should_include(Path::new("nested/Thumbs.db")));
        assert!(compiled.should_include(Path::new("image.jpg")));
    }

    #[test]
    fn test_exclude_extensions() {
        let compiled = CompiledFilters::new(&rules_with_exclude(ExcludeRules {
            extensions: vec!["bak".to_string(), "tmp".to_string()],
            ..Default::default()
        }))
        .unwrap();

        assert!(!compiled.should_include(Path::new("file.bak")));
        assert!(!compiled.should_include(Path::new("file.tmp")));
        assert!(!compiled.should_include(Path::new("file.BAK"))); // Case-insensitive
        assert!(compiled.should_include(Path::new("file.txt")));
    }

    #[test]
    fn test_exclude_glob_patterns_relative_to_root() {
        let compiled = CompiledFilters::new(&rules_with_exclude(ExcludeRules {
            patterns: vec!["*.cache".to_string(), "node_modules/**".to_string()],
            ..Default::default()
        }))
        .unwrap();

        assert!(!compiled.should_include(Path::new("file.cache")));
        assert!(!compiled.should_include(Path::new("node_modules/package.json")));
        assert!(compiled.should_include(Path::new("file.txt")));
    }

    #[test]
    fn test_glob_pattern_directory_boundary_semantics() {
        let compiled = CompiledFilters::new(&rules_with_exclude(ExcludeRules {
            patterns: vec!["**/logs/**".to_string()],
            ..Default::default()
        }))
        .unwrap();

        assert!(!compiled.should_include(Path::new("logs/file.txt")));
        assert!(!compiled.should_include(Path::new("app/logs/file.txt")));

        assert!(compiled.should_include(Path::new("my_logs/file.txt")));
        assert!(compiled.should_include(Path::new("app/my_logs/file.txt")));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let compiled = CompiledFilters::new(&FilterRules {
            enable_hidden_dirs: false,
            exclude: ExcludeRules {
                regex: vec![r"^\.".to_string()],
                ..Default::default()
            },
            include: IncludeRules {
                patterns: vec![".important".to_string()],
            },
        })
        .unwrap();

        // Dotfiles are excluded, but .important is whitelisted
        assert!(compiled.should_include(Path::new(".important")));
        assert!(!compiled.should_include(Path::new(".other")));
    }

    #[test]
    fn test_exclude_regex() {
        let compiled = CompiledFilters::new(&rules_with_exclude(ExcludeRules {
            regex: vec![r"^test_.*\.txt$".to_string()],
            ..Default::default()
        }))
        .unwrap();

        assert!(!compiled.should_include(Path::new("test_file.txt")));
        assert!(!compiled.should_include(Path::new("sub/test_another.txt")));
        assert!(compiled.should_include(Path::new("file.txt")));
    }

    #[test]
    fn test_invalid_regex_returns_error() {
        let config = Config {
            filters: rules_with_exclude(ExcludeRules {
                regex: vec!["[invalid(".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        };

        assert!(matches!(
            config.compile_filters(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));
    }

    #[test]
    fn test_invalid_glob_pattern_returns_error() {
        let config = Config {
            filters: rules_with_exclude(ExcludeRules {
                patterns: vec!["[invalid".to_string()], // Unclosed bracket
                ..Default::default()
            }),
            ..Default::default()
        };

        assert!(matches!(
            config.compile_filters(),
            Err(ConfigError::InvalidGlobPattern(_))
        ));
    }
}
