//! Mapping between the (entry, sub-entry) index space and a folder of folders on disk.
//!
//! Every entry with at least one portrait becomes a folder named `NNNN` or `NNNN_name`, every
//! portrait a file `MMMM` or `MMMM_name` plus the image format's extension. Only the leading
//! digits matter on import, so display names can be edited freely.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use super::Kaomado;
use crate::error::KaoError;
use crate::graphics::Portrait;
use crate::image_io::png::optimise_png;
use crate::image_io::raw::RAW_PAL_FILE_EXTENSION;
use crate::image_io::{export_portrait, import_portrait, is_supported_image_type, ImageFormat};
use crate::progress::{NoProgress, Phase, ProgressObserver};

fn indexed_name(index: usize, name: Option<&str>) -> String {
    match name.filter(|n| !n.is_empty()) {
        Some(name) => format!("{:04}_{}", index, name),
        None => format!("{:04}", index),
    }
}

pub fn entry_folder_name(index: usize, name: Option<&str>) -> String {
    indexed_name(index, name)
}

pub fn subentry_file_stem(index: usize, name: Option<&str>) -> String {
    indexed_name(index, name)
}

/// Reads the decimal digits at the start of `text`. `None` when there are none or they
/// overflow.
pub fn parse_leading_index(text: &str) -> Option<usize> {
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    text[..digits].parse().ok()
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

/// Lists what the importer walks over. Implementations return paths in sorted order and leave
/// out hidden entries.
pub trait DirectorySource {
    fn subdirectories(&self, root: &Path) -> io::Result<Vec<PathBuf>>;
    fn files(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Lists the real filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsDirectorySource;

impl FsDirectorySource {
    fn list(dir: &Path, keep: impl Fn(&fs::FileType) -> bool) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !is_hidden(&path) && keep(&entry.file_type()?) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl DirectorySource for FsDirectorySource {
    fn subdirectories(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        Self::list(root, fs::FileType::is_dir)
    }

    fn files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        Self::list(dir, fs::FileType::is_file)
    }
}

/// Display names appended to folder and file names on export.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameTable {
    #[serde(default)]
    pub entries: Vec<String>,
    #[serde(default)]
    pub subentries: Vec<String>,
}

impl NameTable {
    pub fn from_json_file(path: &Path) -> Result<Self, KaoError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExportOptions {
    pub format: ImageFormat,
    pub entry_names: Option<Vec<String>>,
    pub subentry_names: Option<Vec<String>>,
    /// Recompress written PNGs with oxipng. Ignored for other formats.
    pub optimise_png: bool,
}

impl ExportOptions {
    pub fn with_names(mut self, names: NameTable) -> Self {
        self.entry_names = Some(names.entries);
        self.subentry_names = Some(names.subentries);
        self
    }

    fn entry_name(&self, index: usize) -> Option<&str> {
        self.entry_names.as_ref()?.get(index).map(String::as_str)
    }

    fn subentry_name(&self, index: usize) -> Option<&str> {
        self.subentry_names.as_ref()?.get(index).map(String::as_str)
    }
}

/// Outcome of a folder import. Skipped files and folders don't fail the import.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: usize,
    pub warnings: Vec<String>,
    /// Folders rejected as a whole.
    pub folder_errors: Vec<KaoError>,
}

impl ImportReport {
    fn warn(&mut self, message: String) {
        log::warn!("{}", message);
        self.warnings.push(message);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl Kaomado {
    /// Imports every portrait found under `root`.
    pub fn import_folder(&mut self, root: &Path) -> Result<ImportReport, KaoError> {
        self.import_folder_from(root, &FsDirectorySource, &mut NoProgress)
    }

    pub fn import_folder_from(
        &mut self,
        root: &Path,
        source: &dyn DirectorySource,
        progress: &mut dyn ProgressObserver,
    ) -> Result<ImportReport, KaoError> {
        let folders = source.subdirectories(root)?;
        let total = folders.len();
        let mut report = ImportReport::default();

        for (i, folder) in folders.iter().enumerate() {
            let folder_name = display_name(folder);

            match parse_leading_index(&folder_name) {
                None => report.warn(format!(
                    "Skipping folder {}: name doesn't start with an entry index",
                    folder_name
                )),
                Some(entry) if entry >= self.entry_count() => report.warn(format!(
                    "Skipping folder {}: entry {} is past the last entry ({})",
                    folder_name,
                    entry,
                    self.entry_count().saturating_sub(1)
                )),
                Some(entry) => match self.collect_folder(folder, source, &mut report) {
                    Ok(portraits) => {
                        for (subentry, portrait) in portraits {
                            self.insert_portrait(entry, subentry, portrait)?;
                            report.imported += 1;
                        }
                    }
                    Err(e) => {
                        log::warn!("Folder {} was not imported: {}", folder_name, e);
                        report.folder_errors.push(e);
                    }
                },
            }

            progress.on_progress(Phase::Importing, i + 1, total);
        }

        log::info!(
            "Imported {} portraits from {} folders ({} warnings, {} rejected folders)",
            report.imported,
            total,
            report.warnings.len(),
            report.folder_errors.len()
        );
        Ok(report)
    }

    /// Loads every portrait of one folder. Nothing is stored until the whole folder validated.
    fn collect_folder(
        &self,
        folder: &Path,
        source: &dyn DirectorySource,
        report: &mut ImportReport,
    ) -> Result<Vec<(usize, Portrait)>, KaoError> {
        let mut portraits = Vec::new();

        for file in source.files(folder)? {
            let file_name = display_name(&file);

            if !is_supported_image_type(&file) {
                // Palettes are read along with their .raw image
                let is_palette = file
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(RAW_PAL_FILE_EXTENSION));
                if !is_palette {
                    report.warn(KaoError::UnsupportedImageType(file.clone()).to_string());
                }
                continue;
            }

            let Some(subentry) = parse_leading_index(&file_name) else {
                report.warn(format!(
                    "Skipping {}: name doesn't start with a sub-entry index",
                    file.display()
                ));
                continue;
            };

            if subentry >= self.subentry_count() {
                return Err(KaoError::IndexOutOfRange {
                    folder: display_name(folder),
                    file: file_name,
                    max: self.subentry_count().saturating_sub(1),
                });
            }

            // Listings are sorted, so the first file claiming an index wins
            if portraits.iter().any(|(taken, _)| *taken == subentry) {
                report.warn(format!(
                    "Skipping {}: sub-entry {} is already filled in {}",
                    file.display(),
                    subentry,
                    display_name(folder)
                ));
                continue;
            }

            match import_portrait(&file) {
                Ok(portrait) => portraits.push((subentry, portrait)),
                Err(e) => report.warn(format!("Skipping {}: {}", file.display(), e)),
            }
        }

        Ok(portraits)
    }

    /// Writes every portrait under `root`. Returns the number of images written.
    pub fn export_folder(&self, root: &Path, options: &ExportOptions) -> Result<usize, KaoError> {
        self.export_folder_with_progress(root, options, &mut NoProgress)
    }

    pub fn export_folder_with_progress(
        &self,
        root: &Path,
        options: &ExportOptions,
        progress: &mut dyn ProgressObserver,
    ) -> Result<usize, KaoError> {
        fs::create_dir_all(root)?;

        let total = self.entry_count().saturating_sub(1);
        let mut written = 0;

        // Entry 0 is a placeholder
        for entry in 1..self.entry_count() {
            let toc_entry = &self.toc[entry];

            if toc_entry.has_portraits() {
                let dir = root.join(entry_folder_name(entry, options.entry_name(entry)));
                fs::create_dir_all(&dir)?;

                for (subentry, slot) in toc_entry.subentries.iter().enumerate() {
                    let Some(portrait) = slot.index().and_then(|idx| self.store.get(idx)) else {
                        continue;
                    };

                    let file_stem = subentry_file_stem(subentry, options.subentry_name(subentry));
                    let path = export_portrait(portrait, &dir.join(file_stem), options.format)?;
                    if options.optimise_png && options.format == ImageFormat::Png {
                        optimise_png(&path)?;
                    }

                    log::debug!("Wrote {}", path.display());
                    written += 1;
                }
            }

            progress.on_progress(Phase::Exporting, entry, total);
        }

        log::info!("Exported {} portraits to {}", written, root.display());
        Ok(written)
    }
}
