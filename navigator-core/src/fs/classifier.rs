//! ``src/fs/classifier.rs``
//!
//! # `FileClassifier`: Extension → Category Mapping
//!
//! Pure, total classification of a path by its (case-insensitive) extension.
//! No I/O happens here; the lister decides whether a child is a directory and
//! only asks the classifier about files.

use std::{ffi::OsStr, fmt, path::Path};

use mime_guess::MimeGuess;
use serde::{Deserialize, Serialize};

/// Extensions opened by the image viewer.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png"];

/// Extensions opened by the text/code viewer.
pub const TEXT_EXTENSIONS: &[&str] = &[
    "java",
    "xml",
    "json",
    "txt",
    "properties",
    "yml",
    "yaml",
    "md",
    "html",
    "class",
    "js",
    "css",
    "scss",
    "sass",
];

/// Classification bucket driving which viewer a selection routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Directory,
    Image,
    TextLike,
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: &str = match self {
            Self::Directory => "Directory",
            Self::Image => "Image",
            Self::TextLike => "TextLike",
            Self::Other => "Other",
        };

        write!(f, "{s}")
    }
}

/// Pluggable classification strategy used by the lister.
pub trait Classify: Send + Sync {
    /// Category of a *file* at `path`.
    fn classify(&self, path: &Path) -> Category;
}

/// The static extension table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionClassifier;

impl Classify for ExtensionClassifier {
    #[inline]
    fn classify(&self, path: &Path) -> Category {
        classify(path)
    }
}

/// Classify a file path by extension. Unknown or missing extensions are `Other`.
#[must_use]
pub fn classify(path: &Path) -> Category {
    let Some(ext) = path.extension().and_then(OsStr::to_str) else {
        return Category::Other;
    };

    if contains_ignore_case(IMAGE_EXTENSIONS, ext) {
        Category::Image
    } else if contains_ignore_case(TEXT_EXTENSIONS, ext) {
        Category::TextLike
    } else {
        Category::Other
    }
}

/// Directories are always `Directory`, whatever their name looks like.
#[inline]
#[must_use]
pub fn classify_child(path: &Path, is_dir: bool, classifier: &dyn Classify) -> Category {
    if is_dir {
        Category::Directory
    } else {
        classifier.classify(path)
    }
}

/// MIME type derived from the extension, for handing a file to an external handler.
#[must_use]
pub fn mime_for(path: &Path) -> Option<String> {
    MimeGuess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string())
}

fn contains_ignore_case(table: &[&str], ext: &str) -> bool {
    table.iter().any(|known| known.eq_ignore_ascii_case(ext))
}
