use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use pmd_kaomado::containers::compression::px::PxCompLevel;
use pmd_kaomado::kaomado::FsDirectorySource;
use pmd_kaomado::{
    ExportOptions, ImageFormat, ImageIoError, JsonProgressFile, KaoError, KaoLayout, Kaomado,
    LogProgress, NameTable, ProgressObserver, WriteOptions,
};

#[derive(Parser)]
#[command(
    name = "pmd_kaomado",
    about = "Unpack and rebuild kaomado portrait containers",
    version
)]
struct Cli {
    /// Portrait slots per entry
    #[arg(short, long, global = true, default_value_t = KaoLayout::default().subentry_count)]
    subentries: usize,

    /// Mirror progress into this JSON file
    #[arg(long, global = true)]
    progress_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export every portrait of a kaomado file to a folder tree
    Unpack {
        input: PathBuf,
        output: PathBuf,

        #[arg(short, long, value_enum, default_value = "png")]
        format: CliImageFormat,

        /// JSON file with `entries` and `subentries` display names
        #[arg(long)]
        names: Option<PathBuf>,

        /// Recompress exported PNGs with oxipng
        #[arg(long)]
        optimise: bool,
    },

    /// Build a kaomado file from a folder tree
    Pack {
        input: PathBuf,
        output: PathBuf,

        /// Entries in the table of contents
        #[arg(short, long, default_value_t = KaoLayout::default().entry_count)]
        entries: usize,

        /// PX compression level, 0 to 3
        #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(0..=3))]
        level: u8,

        /// Look for repeated sequences before nibble patterns
        #[arg(long)]
        aggressive: bool,
    },

    /// Print a summary of a kaomado file as JSON
    Info { input: PathBuf },

    /// Render one portrait to an RGBA PNG
    Preview {
        input: PathBuf,
        entry: usize,
        subentry: usize,
        output: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliImageFormat {
    Png,
    Bmp,
    Raw,
}

impl From<CliImageFormat> for ImageFormat {
    fn from(format: CliImageFormat) -> Self {
        match format {
            CliImageFormat::Png => ImageFormat::Png,
            CliImageFormat::Bmp => ImageFormat::Bmp,
            CliImageFormat::Raw => ImageFormat::Raw,
        }
    }
}

fn compression_level(level: u8) -> PxCompLevel {
    match level {
        0 => PxCompLevel::Level0,
        1 => PxCompLevel::Level1,
        2 => PxCompLevel::Level2,
        _ => PxCompLevel::Level3,
    }
}

fn progress_observer(path: Option<&Path>) -> Box<dyn ProgressObserver> {
    match path {
        Some(path) => Box::new(JsonProgressFile::new(path)),
        None => Box::new(LogProgress::default()),
    }
}

fn read_kaomado(
    path: &Path,
    subentries: usize,
    progress: &mut dyn ProgressObserver,
) -> Result<Kaomado, KaoError> {
    let data = fs::read(path)?;
    Ok(Kaomado::parse_with_progress(&data, subentries, progress)?)
}

fn run(cli: Cli) -> Result<(), KaoError> {
    let mut progress = progress_observer(cli.progress_file.as_deref());

    match cli.command {
        Commands::Unpack {
            input,
            output,
            format,
            names,
            optimise,
        } => {
            let kao = read_kaomado(&input, cli.subentries, progress.as_mut())?;

            let mut options = ExportOptions {
                format: format.into(),
                optimise_png: optimise,
                ..ExportOptions::default()
            };
            if let Some(names) = names {
                options = options.with_names(NameTable::from_json_file(&names)?);
            }

            let written = kao.export_folder_with_progress(&output, &options, progress.as_mut())?;
            log::info!("Wrote {} images to {}", written, output.display());
        }

        Commands::Pack {
            input,
            output,
            entries,
            level,
            aggressive,
        } => {
            let mut kao = Kaomado::with_layout(KaoLayout {
                entry_count: entries,
                subentry_count: cli.subentries,
            });

            let report = kao.import_folder_from(&input, &FsDirectorySource, progress.as_mut())?;
            for error in &report.folder_errors {
                log::error!("{}", error);
            }

            let options = WriteOptions {
                level: compression_level(level),
                aggressive_search: aggressive,
            };
            let data = kao.serialize_with_progress(&options, progress.as_mut())?;
            fs::write(&output, &data)?;
            log::info!("Wrote {} ({} bytes)", output.display(), data.len());
        }

        Commands::Info { input } => {
            let kao = read_kaomado(&input, cli.subentries, progress.as_mut())?;
            println!("{}", serde_json::to_string_pretty(&kao.stats())?);
        }

        Commands::Preview {
            input,
            entry,
            subentry,
            output,
        } => {
            let kao = read_kaomado(&input, cli.subentries, progress.as_mut())?;
            match kao.portrait(entry, subentry) {
                Some(portrait) => {
                    portrait
                        .to_rgba_image()
                        .save(&output)
                        .map_err(ImageIoError::from)?;
                    log::info!("Saved {}", output.display());
                }
                None => log::warn!("Entry {} sub-entry {} holds no portrait", entry, subentry),
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
