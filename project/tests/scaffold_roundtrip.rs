//! A scaffolded descriptor edited by hand keeps the edits on the next save.

use std::fs;

use vhdl_project::{Language, ProjectDescriptor, create_project};

#[test]
fn hand_edited_options_survive_rescaffold_load_and_save() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("rtl")).unwrap();
    fs::write(dir.path().join("rtl/top.vhd"), "entity top is end;").unwrap();

    let outcome = create_project(dir.path(), &[], false).unwrap();

    // Simulate a user adding analyser flags and a key this client ignores.
    let mut raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&outcome.path).unwrap()).unwrap();
    raw["options"]["ghdl_analysis"] = serde_json::json!(["--std=08"]);
    raw["options"]["lint"] = serde_json::json!({"level": "strict"});
    fs::write(&outcome.path, raw.to_string()).unwrap();

    let mut descriptor = ProjectDescriptor::load(&outcome.path).unwrap();
    assert!(descriptor.add_file("rtl/pkg.vhd", Language::Vhdl));
    descriptor.save(&outcome.path).unwrap();

    let reloaded = ProjectDescriptor::load_from_root(dir.path()).unwrap().unwrap();
    assert_eq!(reloaded.options.ghdl_analysis, ["--std=08"]);
    assert!(reloaded.options.extra.contains_key("lint"));
    let files: Vec<_> = reloaded.files.iter().map(|f| f.file.as_str()).collect();
    assert_eq!(files, ["rtl/top.vhd", "rtl/pkg.vhd"]);
}
