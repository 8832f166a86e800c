mod common;

use std::fs;
use std::path::Path;

use common::{contents, four_colour_portrait, seeded_portrait};
use pmd_kaomado::image_io::export_portrait;
use pmd_kaomado::{ExportOptions, ImageFormat, KaoError, Kaomado, WriteOptions};

fn write_png(path: &Path, seed: u8) {
    let stem = path.with_extension("");
    export_portrait(&seeded_portrait(seed), &stem, ImageFormat::Png).unwrap();
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn single_portrait_folder_scenario() {
    let mut kao = Kaomado::new(2, 2);
    kao.insert_portrait(1, 0, four_colour_portrait()).unwrap();
    let original = kao.serialize(&WriteOptions::default()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let parsed = Kaomado::parse(&original, 2).unwrap();
    let written = parsed
        .export_folder(dir.path(), &ExportOptions::default())
        .unwrap();

    assert_eq!(written, 1);
    assert_eq!(listing(dir.path()), vec!["0001"]);
    assert_eq!(listing(&dir.path().join("0001")), vec!["0000.png"]);

    let mut reimported = Kaomado::new(2, 2);
    let report = reimported.import_folder(dir.path()).unwrap();
    assert_eq!(report.imported, 1);
    assert!(report.warnings.is_empty());
    assert!(report.folder_errors.is_empty());

    assert_eq!(reimported.portrait(1, 0), Some(&four_colour_portrait()));
    assert_eq!(
        reimported.serialize(&WriteOptions::default()).unwrap(),
        original
    );
}

#[test]
fn folder_round_trip_in_every_format() {
    let mut kao = Kaomado::new(5, 8);
    kao.insert_portrait(1, 0, seeded_portrait(0)).unwrap();
    kao.insert_portrait(1, 7, seeded_portrait(1)).unwrap();
    kao.insert_portrait(3, 2, four_colour_portrait()).unwrap();
    kao.insert_portrait(4, 5, seeded_portrait(2)).unwrap();

    for format in ImageFormat::SUPPORTED {
        let dir = tempfile::tempdir().unwrap();
        let written = kao
            .export_folder(dir.path(), &ExportOptions { format, ..ExportOptions::default() })
            .unwrap();
        assert_eq!(written, 4);

        let mut reimported = Kaomado::new(5, 8);
        let report = reimported.import_folder(dir.path()).unwrap();
        assert_eq!(report.imported, 4, "{:?}", format);
        assert!(report.warnings.is_empty(), "{:?}: {:?}", format, report.warnings);
        assert_eq!(contents(&reimported), contents(&kao));
    }
}

#[test]
fn entry_zero_and_empty_entries_get_no_folder() {
    let mut kao = Kaomado::new(4, 2);
    kao.insert_portrait(0, 0, seeded_portrait(5)).unwrap();
    kao.insert_portrait(2, 1, seeded_portrait(6)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let written = kao
        .export_folder(dir.path(), &ExportOptions::default())
        .unwrap();

    assert_eq!(written, 1);
    assert_eq!(listing(dir.path()), vec!["0002"]);
}

#[test]
fn display_names_are_appended_and_ignored_on_import() {
    let mut kao = Kaomado::new(3, 3);
    kao.insert_portrait(1, 0, seeded_portrait(3)).unwrap();
    kao.insert_portrait(2, 2, seeded_portrait(4)).unwrap();

    let options = ExportOptions {
        format: ImageFormat::Bmp,
        entry_names: Some(vec!["".into(), "Bulbasaur".into(), "Mr. Mime".into()]),
        subentry_names: Some(vec!["Normal".into(), "Happy".into()]),
        optimise_png: false,
    };

    let dir = tempfile::tempdir().unwrap();
    kao.export_folder(dir.path(), &options).unwrap();

    assert_eq!(listing(dir.path()), vec!["0001_Bulbasaur", "0002_Mr. Mime"]);
    assert_eq!(
        listing(&dir.path().join("0001_Bulbasaur")),
        vec!["0000_Normal.bmp"]
    );
    // No name past the end of the table
    assert_eq!(listing(&dir.path().join("0002_Mr. Mime")), vec!["0002.bmp"]);

    let mut reimported = Kaomado::new(3, 3);
    reimported.import_folder(dir.path()).unwrap();
    assert_eq!(contents(&reimported), contents(&kao));
}

#[test]
fn raw_export_writes_palette_files() {
    let mut kao = Kaomado::new(2, 2);
    kao.insert_portrait(1, 1, seeded_portrait(8)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let options = ExportOptions {
        format: ImageFormat::Raw,
        ..ExportOptions::default()
    };
    assert_eq!(kao.export_folder(dir.path(), &options).unwrap(), 1);
    assert_eq!(
        listing(&dir.path().join("0001")),
        vec!["0001.pal", "0001.raw"]
    );
}

#[test]
fn optimised_png_export_reimports_identically() {
    let mut kao = Kaomado::new(2, 2);
    kao.insert_portrait(1, 0, seeded_portrait(11)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let options = ExportOptions {
        optimise_png: true,
        ..ExportOptions::default()
    };
    kao.export_folder(dir.path(), &options).unwrap();
    assert_eq!(listing(&dir.path().join("0001")), vec!["0000.png"]);

    let mut reimported = Kaomado::new(2, 2);
    reimported.import_folder(dir.path()).unwrap();
    assert_eq!(contents(&reimported), contents(&kao));
}

#[test]
fn out_of_range_file_rejects_its_whole_folder() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("0001");
    let good = dir.path().join("0002");
    fs::create_dir_all(&bad).unwrap();
    fs::create_dir_all(&good).unwrap();

    write_png(&bad.join("0000.png"), 1);
    write_png(&bad.join("9999_extra.png"), 2);
    write_png(&good.join("0003.png"), 3);

    let mut kao = Kaomado::new(4, 16);
    let report = kao.import_folder(dir.path()).unwrap();

    assert_eq!(report.imported, 1);
    assert_eq!(report.folder_errors.len(), 1);
    match &report.folder_errors[0] {
        KaoError::IndexOutOfRange { folder, file, max } => {
            assert_eq!(folder, "0001");
            assert_eq!(file, "9999_extra.png");
            assert_eq!(*max, 15);
        }
        other => panic!("unexpected folder error: {}", other),
    }

    // 0000.png was valid but its folder contributes nothing
    assert_eq!(kao.portrait(1, 0), None);
    assert_eq!(kao.portrait(2, 3), Some(&seeded_portrait(3)));
}

#[test]
fn unusable_files_and_folders_are_skipped_with_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let entry = dir.path().join("0001_Bulbasaur");
    fs::create_dir_all(&entry).unwrap();
    fs::create_dir_all(dir.path().join("0007")).unwrap();
    fs::create_dir_all(dir.path().join("unsorted")).unwrap();
    fs::create_dir_all(dir.path().join(".thumbnails")).unwrap();

    write_png(&entry.join("0000.png"), 1);
    write_png(&entry.join("happy.png"), 2);
    write_png(&entry.join(".0001.png"), 3);
    fs::write(entry.join("notes.txt"), "todo").unwrap();
    fs::write(entry.join("0002.png"), "not a png").unwrap();
    write_png(&dir.path().join("0007").join("0000.png"), 4);

    let mut kao = Kaomado::new(4, 4);
    let report = kao.import_folder(dir.path()).unwrap();

    assert_eq!(report.imported, 1);
    assert!(report.folder_errors.is_empty());
    // 0002.png, happy.png, notes.txt, entry 7 and the unnumbered folder
    assert_eq!(report.warnings.len(), 5, "{:?}", report.warnings);
    assert!(report.warnings.iter().any(|w| w.contains("notes.txt")));
    assert_eq!(kao.portrait(1, 0), Some(&seeded_portrait(1)));
    assert_eq!(kao.portrait(1, 1), None);
    assert_eq!(kao.portraits().count(), 1);
}

#[test]
fn wrong_sized_image_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let entry = dir.path().join("0001");
    fs::create_dir_all(&entry).unwrap();
    image::RgbaImage::new(64, 64)
        .save(entry.join("0000.png"))
        .unwrap();
    write_png(&entry.join("0001.png"), 5);

    let mut kao = Kaomado::new(2, 4);
    let report = kao.import_folder(dir.path()).unwrap();

    assert_eq!(report.imported, 1);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("64x64"));
}

#[test]
fn duplicate_subentry_keeps_the_first_file() {
    let dir = tempfile::tempdir().unwrap();
    let entry = dir.path().join("0001");
    fs::create_dir_all(&entry).unwrap();

    export_portrait(&seeded_portrait(1), &entry.join("0000"), ImageFormat::Bmp).unwrap();
    write_png(&entry.join("0000.png"), 2);
    write_png(&entry.join("0001_Happy.png"), 3);
    write_png(&entry.join("0001.png"), 4);

    let mut kao = Kaomado::new(2, 4);
    let report = kao.import_folder(dir.path()).unwrap();

    assert_eq!(report.imported, 2);
    assert!(report.folder_errors.is_empty());
    assert_eq!(report.warnings.len(), 2, "{:?}", report.warnings);
    assert!(report.warnings.iter().any(|w| w.contains("0000.png")));
    // "0001.png" sorts before "0001_Happy.png"
    assert!(report.warnings.iter().any(|w| w.contains("0001_Happy.png")));
    assert_eq!(kao.portrait(1, 0), Some(&seeded_portrait(1)));
    assert_eq!(kao.portrait(1, 1), Some(&seeded_portrait(4)));
}
