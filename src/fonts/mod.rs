//! Font loading for report documents.
//!
//! genpdf needs TrueType files for glyph metrics.  The bundled family is looked
//! up first (configured directory, `CHECKIN_REPORT_FONTS_DIR`, `assets/fonts`
//! next to the executable, then `assets/fonts` in the crate); when it is absent
//! the metric-compatible system families below are tried in order.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{self, FontData, FontFamily};
use log::{debug, warn};

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "LiberationSans";

/// Environment variable overriding the bundled font directory.
pub const FONTS_DIR_ENV: &str = "CHECKIN_REPORT_FONTS_DIR";

const FONT_FILES: &[&str] = &[
    "LiberationSans-Regular.ttf",
    "LiberationSans-Bold.ttf",
    "LiberationSans-Italic.ttf",
    "LiberationSans-BoldItalic.ttf",
];

struct SystemFamily {
    name: &'static str,
    directories: &'static [&'static str],
    regular: &'static str,
    bold: &'static str,
    italic: &'static str,
    bold_italic: &'static str,
}

const SYSTEM_FAMILIES: &[SystemFamily] = &[
    SystemFamily {
        name: "Liberation Sans",
        directories: &[
            "/usr/share/fonts/truetype/liberation",
            "/usr/share/fonts/truetype/liberation2",
            "/usr/share/fonts/liberation-sans",
            "/usr/share/fonts/liberation",
        ],
        regular: "LiberationSans-Regular.ttf",
        bold: "LiberationSans-Bold.ttf",
        italic: "LiberationSans-Italic.ttf",
        bold_italic: "LiberationSans-BoldItalic.ttf",
    },
    SystemFamily {
        name: "DejaVu Sans",
        directories: &[
            "/usr/share/fonts/truetype/dejavu",
            "/usr/share/fonts/dejavu",
            "/usr/share/fonts/TTF",
        ],
        regular: "DejaVuSans.ttf",
        bold: "DejaVuSans-Bold.ttf",
        italic: "DejaVuSans-Oblique.ttf",
        bold_italic: "DejaVuSans-BoldOblique.ttf",
    },
    SystemFamily {
        name: "Arial",
        directories: &[
            "C:\\Windows\\Fonts",
            "/Library/Fonts",
            "/System/Library/Fonts/Supplemental",
        ],
        regular: "arial.ttf",
        bold: "arialbd.ttf",
        italic: "ariali.ttf",
        bold_italic: "arialbi.ttf",
    },
];

fn push_unique(candidates: &mut Vec<PathBuf>, candidate: PathBuf) {
    if !candidates.iter().any(|existing| existing == &candidate) {
        candidates.push(candidate);
    }
}

fn font_directory_candidates(configured: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = configured {
        push_unique(&mut candidates, path.to_path_buf());
    }

    if let Ok(path) = env::var(FONTS_DIR_ENV) {
        if !path.trim().is_empty() {
            push_unique(&mut candidates, PathBuf::from(path));
        }
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            push_unique(&mut candidates, bin_dir.join("assets/fonts"));
        }
    }

    push_unique(
        &mut candidates,
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts"),
    );

    candidates
}

fn missing_font_files(path: &Path) -> Vec<PathBuf> {
    FONT_FILES
        .iter()
        .map(|name| path.join(name))
        .filter(|candidate| !candidate.is_file())
        .collect()
}

fn resolve_font_directory(configured: Option<&Path>) -> Result<PathBuf, Error> {
    let mut attempts = Vec::new();

    for candidate in font_directory_candidates(configured) {
        let exists = candidate.is_dir();
        let missing = missing_font_files(&candidate);

        if exists && missing.is_empty() {
            return Ok(candidate);
        }

        let reason = if !exists {
            format!("directory missing at {}", candidate.display())
        } else {
            let missing_list = missing
                .iter()
                .map(|path| path.file_name().unwrap_or_default().to_string_lossy())
                .collect::<Vec<_>>()
                .join(", ");
            format!("missing files [{}]", missing_list)
        };

        attempts.push(format!("{} ({})", candidate.display(), reason));
    }

    let summary = if attempts.is_empty() {
        "no search paths were available".to_owned()
    } else {
        attempts.join(", ")
    };

    Err(Error::new(
        format!(
            "Unable to locate bundled font directory. Checked: {}. See assets/fonts/README.md or set {}.",
            summary, FONTS_DIR_ENV
        ),
        io::Error::new(io::ErrorKind::NotFound, "bundled fonts directory not found"),
    ))
}

fn load_bundled_font_family(configured: Option<&Path>) -> Result<FontFamily<FontData>, Error> {
    let directory = resolve_font_directory(configured)?;
    debug!("loading bundled fonts from {}", directory.display());

    fonts::from_files(&directory, DEFAULT_FONT_FAMILY_NAME, None).map_err(|err| {
        Error::new(
            format!(
                "Failed to load default font family '{}' from {}: {}",
                DEFAULT_FONT_FAMILY_NAME,
                directory.display(),
                err
            ),
            io::Error::new(io::ErrorKind::Other, err.to_string()),
        )
    })
}

impl SystemFamily {
    fn directory(&self) -> Option<PathBuf> {
        self.directories
            .iter()
            .map(PathBuf::from)
            .find(|dir| self.files().iter().all(|file| dir.join(file).is_file()))
    }

    fn files(&self) -> [&'static str; 4] {
        [self.regular, self.bold, self.italic, self.bold_italic]
    }

    fn load(&self, directory: &Path) -> Result<FontFamily<FontData>, Error> {
        Ok(FontFamily {
            regular: load_system_font(directory, self.regular, "regular")?,
            bold: load_system_font(directory, self.bold, "bold")?,
            italic: load_system_font(directory, self.italic, "italic")?,
            bold_italic: load_system_font(directory, self.bold_italic, "bold italic")?,
        })
    }
}

fn load_system_font(directory: &Path, file: &str, style: &str) -> Result<FontData, Error> {
    let path = directory.join(file);
    FontData::load(&path, None).map_err(|err| {
        let io_kind = if path.is_file() {
            io::ErrorKind::Other
        } else {
            io::ErrorKind::NotFound
        };
        Error::new(
            format!(
                "Failed to load system fallback {} font at {}: {}",
                style,
                path.display(),
                err
            ),
            io::Error::new(io_kind, err.to_string()),
        )
    })
}

fn system_fallback_font_family() -> Result<FontFamily<FontData>, Error> {
    let mut last_error = None;
    for family in SYSTEM_FAMILIES {
        let Some(directory) = family.directory() else {
            continue;
        };
        match family.load(&directory) {
            Ok(loaded) => {
                debug!(
                    "using system font family '{}' from {}",
                    family.name,
                    directory.display()
                );
                return Ok(loaded);
            }
            Err(err) => last_error = Some(err),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        Error::new(
            "No system font family found for fallback",
            io::Error::new(io::ErrorKind::NotFound, "system fonts not found"),
        )
    }))
}

fn fonts_missing(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::IoError(io_err)
            if io_err.kind() == io::ErrorKind::NotFound
                || io_err.kind() == io::ErrorKind::PermissionDenied
    )
}

/// Returns the bundled font family if available and falls back to a system family when the
/// bundled fonts are missing.
pub fn default_font_family(configured: Option<&Path>) -> Result<FontFamily<FontData>, Error> {
    match load_bundled_font_family(configured) {
        Ok(family) => Ok(family),
        Err(err) if fonts_missing(&err) => match system_fallback_font_family() {
            Ok(fallback) => {
                warn!("Bundled fonts unavailable ({}); using a system font family.", err);
                Ok(fallback)
            }
            Err(fallback_err) => Err(Error::new(
                format!(
                    "Bundled fonts unavailable ({}) and system fallback failed: {}",
                    err, fallback_err
                ),
                io::Error::new(io::ErrorKind::NotFound, "default fonts are not available"),
            )),
        },
        Err(err) => Err(err),
    }
}

/// Indicates whether a usable font family (bundled or system) can be found.
pub fn default_fonts_available(configured: Option<&Path>) -> bool {
    resolve_font_directory(configured).is_ok()
        || SYSTEM_FAMILIES.iter().any(|family| family.directory().is_some())
}
