//! End-to-end extract/merge behavior on real document trees.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use protoloc::{Catalog, Extractor, Merger, NoProgress};

fn write_tree(root: &PathBuf, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

const WARDROBE: &str = "\
# Clothing prototypes.
- type: entity
  id: jacket_1
  name: \"winter jacket\" # display name
  description: A warm jacket.
- type: entity
  parent: ClothingBase
  name: leather boots
";

#[test]
fn test_extract_then_merge_originals_is_a_fixed_point() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("protos");
    write_tree(
        &src,
        &[
            ("Clothing/wardrobe.yml", WARDROBE),
            ("chairs.yml", "- id: chair_1\n  name: A plain chair\n"),
        ],
    );

    let catalog_path = temp.path().join("en.json");
    let stats = Extractor::new(&src)
        .run(&catalog_path, &NoProgress)
        .unwrap()
        .finished()
        .unwrap();
    assert_eq!(stats.total_strings, 4);

    // Answer every entry with its own original text.
    let echo: BTreeMap<String, String> = Catalog::load(&catalog_path)
        .unwrap()
        .entries
        .into_iter()
        .map(|e| (e.key, e.original))
        .collect();
    let translated = temp.path().join("zh.json");
    fs::write(&translated, serde_json::to_string(&echo).unwrap()).unwrap();

    let out = temp.path().join("merged");
    let merge_stats = Merger::new(&src, &out)
        .run(&translated, &NoProgress)
        .unwrap()
        .finished()
        .unwrap();

    assert_eq!(merge_stats.files_modified, 0);
    assert_eq!(merge_stats.applied, 0);
    assert_eq!(merge_stats.skipped, 4);
    assert!(!out.exists());
}

#[test]
fn test_merge_preserves_every_untouched_byte() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("protos");
    write_tree(&src, &[("wardrobe.yml", WARDROBE)]);

    let translated = temp.path().join("zh.json");
    fs::write(
        &translated,
        r#"{"jacket_1.name": "冬季夹克", "Parent_ClothingBase.name": "皮靴"}"#,
    )
    .unwrap();

    let out = temp.path().join("merged");
    let stats = Merger::new(&src, &out)
        .run(&translated, &NoProgress)
        .unwrap()
        .finished()
        .unwrap();
    assert_eq!(stats.applied, 2);

    let merged = fs::read_to_string(out.join("wardrobe.yml")).unwrap();
    let expected = "\
# Clothing prototypes.
- type: entity
  id: jacket_1
  name: \"冬季夹克\" # display name
  description: A warm jacket.
- type: entity
  parent: ClothingBase
  name: 皮靴
";
    assert_eq!(merged, expected);
}

#[test]
fn test_second_incremental_run_skips_everything() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("protos");
    write_tree(
        &src,
        &[
            ("wardrobe.yml", WARDROBE),
            ("chairs.yml", "- id: chair_1\n  name: A plain chair\n"),
        ],
    );

    let catalog_path = temp.path().join("en.json");
    let mut extractor = Extractor::new(&src);
    extractor.set_incremental(true);

    let first = extractor
        .run(&catalog_path, &NoProgress)
        .unwrap()
        .finished()
        .unwrap();
    assert_eq!(first.files_skipped, 0);
    let first_catalog = fs::read_to_string(&catalog_path).unwrap();

    let second = extractor
        .run(&catalog_path, &NoProgress)
        .unwrap()
        .finished()
        .unwrap();
    assert_eq!(second.files_skipped, 2);
    assert_eq!(second.total_strings, first.total_strings);
    assert_eq!(fs::read_to_string(&catalog_path).unwrap(), first_catalog);
}

#[test]
fn test_touched_file_is_rescanned_and_the_rest_carried_forward() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("protos");
    write_tree(
        &src,
        &[
            ("wardrobe.yml", WARDROBE),
            ("chairs.yml", "- id: chair_1\n  name: A plain chair\n"),
        ],
    );

    let catalog_path = temp.path().join("en.json");
    let mut extractor = Extractor::new(&src);
    extractor.set_incremental(true);
    extractor.run(&catalog_path, &NoProgress).unwrap();

    fs::write(
        src.join("chairs.yml"),
        "- id: chair_1\n  name: A comfy chair\n",
    )
    .unwrap();
    let stats = extractor
        .run(&catalog_path, &NoProgress)
        .unwrap()
        .finished()
        .unwrap();
    assert_eq!(stats.files_skipped, 1);

    let catalog = Catalog::load(&catalog_path).unwrap();
    let chair = catalog
        .entries
        .iter()
        .find(|e| e.key == "chair_1.name")
        .unwrap();
    assert_eq!(chair.original, "A comfy chair");
    assert!(catalog.entries.iter().any(|e| e.key == "jacket_1.name"));
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_keeps_its_previous_entries() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let src = temp.path().join("protos");
    write_tree(
        &src,
        &[
            ("wardrobe.yml", WARDROBE),
            ("chairs.yml", "- id: chair_1\n  name: A plain chair\n"),
        ],
    );

    let catalog_path = temp.path().join("en.json");
    let mut extractor = Extractor::new(&src);
    extractor.set_incremental(true);
    extractor.run(&catalog_path, &NoProgress).unwrap();

    let chairs = src.join("chairs.yml");
    fs::set_permissions(&chairs, fs::Permissions::from_mode(0o000)).unwrap();
    if protoloc::cache::fingerprint(&chairs).is_ok() {
        // Running with privileges that bypass file modes; the read failure
        // cannot be provoked here.
        return;
    }

    extractor.run(&catalog_path, &NoProgress).unwrap();
    fs::set_permissions(&chairs, fs::Permissions::from_mode(0o644)).unwrap();

    let catalog = Catalog::load(&catalog_path).unwrap();
    assert!(
        catalog.entries.iter().any(|e| e.key == "chair_1.name"),
        "entries from a temporarily unreadable file must survive"
    );
    assert!(catalog.entries.iter().any(|e| e.key == "jacket_1.name"));
}

#[test]
fn test_deleted_file_drops_out_of_the_catalog() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("protos");
    write_tree(
        &src,
        &[
            ("wardrobe.yml", WARDROBE),
            ("chairs.yml", "- id: chair_1\n  name: A plain chair\n"),
        ],
    );

    let catalog_path = temp.path().join("en.json");
    let mut extractor = Extractor::new(&src);
    extractor.set_incremental(true);
    extractor.run(&catalog_path, &NoProgress).unwrap();

    fs::remove_file(src.join("chairs.yml")).unwrap();
    extractor.run(&catalog_path, &NoProgress).unwrap();

    let catalog = Catalog::load(&catalog_path).unwrap();
    assert!(!catalog.entries.iter().any(|e| e.key == "chair_1.name"));
    assert!(catalog.entries.iter().any(|e| e.key == "jacket_1.name"));
}

#[test]
fn test_chair_catalog_entry_shape() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("protos");
    write_tree(
        &src,
        &[(
            "Furniture/chairs.yml",
            "- type: entity\n  id: chair_1\n  name: A plain chair\n  description: Four legs and a back.\n",
        )],
    );

    let catalog_path = temp.path().join("en.json");
    Extractor::new(&src).run(&catalog_path, &NoProgress).unwrap();

    let catalog = Catalog::load(&catalog_path).unwrap();
    let name = catalog
        .entries
        .iter()
        .find(|e| e.key == "chair_1.name")
        .unwrap();
    assert_eq!(name.original, "A plain chair");
    assert!(name.context.starts_with("file: Furniture/chairs.yml\n"));
    assert!(name.context.contains("chair_1"));
    assert_eq!(name.source_file(), Some("Furniture/chairs.yml"));
    assert!(catalog
        .entries
        .iter()
        .any(|e| e.key == "chair_1.description"));
}
