//! Caption font discovery and resolution.
//!
//! Fonts are resolved by name through an ordered chain of resolvers: the
//! custom font directory first, then a per-platform table of system fonts.
//! When nothing matches, captions use the renderer's default font.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Font file extensions picked up from the font directory.
pub const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "woff", "woff2"];

/// A font file and the name shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontDescriptor {
    pub name: String,
    pub path: PathBuf,
}

/// Lists available fonts.
pub trait FontCatalog: Send + Sync {
    fn list_fonts(&self) -> Vec<FontDescriptor>;
}

/// Maps a requested font name to a font file.
pub trait FontResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<PathBuf>;
}

/// Fonts found in a directory, rescanned on every listing so new uploads show up.
#[derive(Debug, Clone)]
pub struct DirectoryFontCatalog {
    dir: PathBuf,
}

impl DirectoryFontCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FontCatalog for DirectoryFontCatalog {
    fn list_fonts(&self) -> Vec<FontDescriptor> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.dir.display(), "Font directory unreadable: {}", e);
                return Vec::new();
            }
        };

        let mut fonts: Vec<FontDescriptor> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_font_file(path))
            .filter_map(|path| {
                let stem = path.file_stem()?.to_string_lossy().to_string();
                Some(FontDescriptor {
                    name: display_name(&stem),
                    path,
                })
            })
            .collect();

        fonts.sort_by(|a, b| a.name.cmp(&b.name));
        fonts
    }
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FONT_EXTENSIONS.iter().any(|f| f.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// `Open_Sans-Bold` becomes `Open Sans Bold`.
fn display_name(stem: &str) -> String {
    stem.replace(['-', '_'], " ")
}

/// Lowercase and drop spaces, dashes and underscores.
pub fn normalize_font_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Resolves names against a catalog: exact normalized match or substring of a
/// catalog name, first in catalog order.
pub struct CatalogFontResolver {
    catalog: Arc<dyn FontCatalog>,
}

impl CatalogFontResolver {
    pub fn new(catalog: Arc<dyn FontCatalog>) -> Self {
        Self { catalog }
    }
}

impl FontResolver for CatalogFontResolver {
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let wanted = normalize_font_name(name);
        if wanted.is_empty() {
            return None;
        }
        self.catalog
            .list_fonts()
            .into_iter()
            .find(|font| {
                let candidate = normalize_font_name(&font.name);
                candidate == wanted || candidate.contains(&wanted)
            })
            .map(|font| font.path)
    }
}

/// Fixed name-to-file table of system fonts with an optional fallback entry.
#[derive(Debug, Clone, Default)]
pub struct PlatformFontTable {
    entries: Vec<(String, PathBuf)>,
    fallback: Option<String>,
}

impl PlatformFontTable {
    pub fn new(entries: Vec<(String, PathBuf)>, fallback: Option<String>) -> Self {
        Self { entries, fallback }
    }

    /// Table for the platform this binary was built for.
    pub fn system() -> Self {
        if cfg!(target_os = "windows") {
            Self::windows()
        } else if cfg!(target_os = "macos") {
            Self::macos()
        } else {
            Self::linux()
        }
    }

    pub fn windows() -> Self {
        Self::from_pairs(
            &[
                ("Arial", "C:/Windows/Fonts/arial.ttf"),
                ("Courier", "C:/Windows/Fonts/cour.ttf"),
                ("Times", "C:/Windows/Fonts/times.ttf"),
                ("Verdana", "C:/Windows/Fonts/verdana.ttf"),
                ("Georgia", "C:/Windows/Fonts/georgia.ttf"),
            ],
            Some("Arial"),
        )
    }

    pub fn macos() -> Self {
        Self::from_pairs(
            &[
                ("Arial", "/System/Library/Fonts/Supplemental/Arial.ttf"),
                ("Courier", "/System/Library/Fonts/Supplemental/Courier New.ttf"),
                ("Times", "/System/Library/Fonts/Supplemental/Times New Roman.ttf"),
                ("Verdana", "/System/Library/Fonts/Supplemental/Verdana.ttf"),
                ("Georgia", "/System/Library/Fonts/Supplemental/Georgia.ttf"),
            ],
            Some("Arial"),
        )
    }

    pub fn linux() -> Self {
        Self::from_pairs(
            &[
                ("Arial", "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf"),
                ("Courier", "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf"),
                ("Times", "/usr/share/fonts/truetype/liberation/LiberationSerif-Regular.ttf"),
                ("Verdana", "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
                ("Georgia", "/usr/share/fonts/truetype/dejavu/DejaVuSerif.ttf"),
            ],
            Some("Arial"),
        )
    }

    fn from_pairs(pairs: &[(&str, &str)], fallback: Option<&str>) -> Self {
        Self {
            entries: pairs
                .iter()
                .map(|(name, path)| (name.to_string(), PathBuf::from(path)))
                .collect(),
            fallback: fallback.map(str::to_string),
        }
    }

    fn lookup(&self, name: &str) -> Option<&PathBuf> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, path)| path)
    }
}

impl FontResolver for PlatformFontTable {
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        if let Some(path) = self.lookup(name).filter(|p| p.exists()) {
            return Some(path.clone());
        }
        self.fallback
            .as_deref()
            .and_then(|fallback| self.lookup(fallback))
            .filter(|p| p.exists())
            .cloned()
    }
}

/// Ordered resolvers; the first hit wins.
#[derive(Clone, Default)]
pub struct FontResolverChain {
    resolvers: Vec<Arc<dyn FontResolver>>,
}

impl FontResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom directory first, then the system table.
    pub fn standard(font_dir: impl Into<PathBuf>) -> Self {
        let catalog: Arc<dyn FontCatalog> = Arc::new(DirectoryFontCatalog::new(font_dir));
        Self::new()
            .with(Arc::new(CatalogFontResolver::new(catalog)))
            .with(Arc::new(PlatformFontTable::system()))
    }

    pub fn with(mut self, resolver: Arc<dyn FontResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let found = self.resolvers.iter().find_map(|r| r.resolve(name));
        if found.is_none() {
            warn!(font = %name, "No font file found, using renderer default");
        }
        found
    }
}
