//! Filesystem-level rotation behavior on scratch directories.

use std::fs;
use std::path::Path;

use restartio::{restart_rename, Status};

fn write_file(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

fn read_file(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap()
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

fn template(dir: &Path, basename: &str) -> String {
    dir.join(basename).to_str().unwrap().to_string()
}

#[test]
fn first_rotation_lands_in_slot_zero() {
    restartio::set_error_handler_off();
    let scratch = tempfile::tempdir().unwrap();
    let dir = scratch.path();
    write_file(dir, "new", "fresh");

    restart_rename(dir.join("new").to_str().unwrap(), &template(dir, "chk###"), 3).unwrap();

    assert_eq!(listing(dir), vec!["chk000"]);
    assert_eq!(read_file(dir, "chk000"), "fresh");
}

#[test]
fn rotation_shifts_existing_slots_outward() {
    restartio::set_error_handler_off();
    let scratch = tempfile::tempdir().unwrap();
    let dir = scratch.path();
    write_file(dir, "chk000", "slot0");
    write_file(dir, "chk001", "slot1");
    write_file(dir, "new", "fresh");

    restart_rename(dir.join("new").to_str().unwrap(), &template(dir, "chk###"), 3).unwrap();

    assert_eq!(listing(dir), vec!["chk000", "chk001", "chk002"]);
    assert_eq!(read_file(dir, "chk000"), "fresh");
    assert_eq!(read_file(dir, "chk001"), "slot0");
    assert_eq!(read_file(dir, "chk002"), "slot1");
}

#[test]
fn slots_beyond_the_horizon_are_left_in_place() {
    restartio::set_error_handler_off();
    let scratch = tempfile::tempdir().unwrap();
    let dir = scratch.path();
    for (name, contents) in [("chk000", "s0"), ("chk001", "s1"), ("chk002", "s2")] {
        write_file(dir, name, contents);
    }
    write_file(dir, "new", "fresh");

    restart_rename(dir.join("new").to_str().unwrap(), &template(dir, "chk###"), 3).unwrap();

    // chk002 may not shift to chk003; it is retained untouched and then
    // overwritten by the shift of chk001.
    assert_eq!(listing(dir), vec!["chk000", "chk001", "chk002"]);
    assert_eq!(read_file(dir, "chk000"), "fresh");
    assert_eq!(read_file(dir, "chk001"), "s0");
    assert_eq!(read_file(dir, "chk002"), "s1");
}

#[test]
fn keep_one_recycles_a_single_slot() {
    restartio::set_error_handler_off();
    let scratch = tempfile::tempdir().unwrap();
    let dir = scratch.path();
    write_file(dir, "chk0", "old");
    write_file(dir, "new", "fresh");

    restart_rename(dir.join("new").to_str().unwrap(), &template(dir, "chk#"), 1).unwrap();

    assert_eq!(listing(dir), vec!["chk0"]);
    assert_eq!(read_file(dir, "chk0"), "fresh");
}

#[test]
fn width_widens_to_cover_keep() {
    restartio::set_error_handler_off();
    let scratch = tempfile::tempdir().unwrap();
    let dir = scratch.path();
    write_file(dir, "new", "fresh");

    restart_rename(dir.join("new").to_str().unwrap(), &template(dir, "chk#"), 1000).unwrap();

    assert_eq!(listing(dir), vec!["chk0000"]);
}

#[test]
fn narrow_names_still_rotate_after_widening() {
    restartio::set_error_handler_off();
    let scratch = tempfile::tempdir().unwrap();
    let dir = scratch.path();
    // Written before anyone raised keep; index digits are narrower than
    // the widened field.
    write_file(dir, "chk0", "old");
    write_file(dir, "new", "fresh");

    restart_rename(dir.join("new").to_str().unwrap(), &template(dir, "chk#"), 99).unwrap();

    assert_eq!(listing(dir), vec!["chk00", "chk01"]);
    assert_eq!(read_file(dir, "chk00"), "fresh");
    assert_eq!(read_file(dir, "chk01"), "old");
}

#[test]
fn suffixed_templates_rotate() {
    restartio::set_error_handler_off();
    let scratch = tempfile::tempdir().unwrap();
    let dir = scratch.path();
    write_file(dir, "run00.h5", "r0");
    write_file(dir, "unrelated.h5", "x");
    write_file(dir, "new.h5", "fresh");

    restart_rename(
        dir.join("new.h5").to_str().unwrap(),
        &template(dir, "run##.h5"),
        5,
    )
    .unwrap();

    assert_eq!(listing(dir), vec!["run00.h5", "run01.h5", "unrelated.h5"]);
    assert_eq!(read_file(dir, "run00.h5"), "fresh");
    assert_eq!(read_file(dir, "run01.h5"), "r0");
    assert_eq!(read_file(dir, "unrelated.h5"), "x");
}

#[test]
fn many_slots_shift_in_numeric_order() {
    restartio::set_error_handler_off();
    let scratch = tempfile::tempdir().unwrap();
    let dir = scratch.path();
    for i in 0..11 {
        write_file(dir, &format!("chk{i:03}"), &format!("s{i}"));
    }
    write_file(dir, "new", "fresh");

    restart_rename(dir.join("new").to_str().unwrap(), &template(dir, "chk###"), 20).unwrap();

    assert_eq!(read_file(dir, "chk000"), "fresh");
    for i in 0..11 {
        assert_eq!(read_file(dir, &format!("chk{:03}", i + 1)), format!("s{i}"));
    }
}

#[test]
fn missing_source_fails_without_touching_slots() {
    restartio::set_error_handler_off();
    let scratch = tempfile::tempdir().unwrap();
    let dir = scratch.path();
    write_file(dir, "chk000", "slot0");

    let err = restart_rename(
        dir.join("absent").to_str().unwrap(),
        &template(dir, "chk###"),
        3,
    )
    .unwrap_err();

    assert_eq!(err.status(), Status::EFailed);
    assert_eq!(listing(dir), vec!["chk000"]);
    assert_eq!(read_file(dir, "chk000"), "slot0");
}

#[test]
fn bad_arguments_are_usage_errors() {
    restartio::set_error_handler_off();
    let scratch = tempfile::tempdir().unwrap();
    let dir = scratch.path();
    write_file(dir, "new", "fresh");
    let src = dir.join("new");
    let src = src.to_str().unwrap();

    let err = restart_rename(src, &template(dir, "chk###"), 0).unwrap_err();
    assert_eq!(err.status(), Status::EInval);

    let err = restart_rename(src, &template(dir, "chk"), 3).unwrap_err();
    assert_eq!(err.status(), Status::EInval);

    let err = restart_rename(src, &template(dir, "a#b#"), 3).unwrap_err();
    assert_eq!(err.status(), Status::EInval);

    // The source survives every refused call.
    assert_eq!(read_file(dir, "new"), "fresh");
}
