use jm_classfile::access::*;
use jm_classfile::opcodes::*;
use jm_classfile::ClassFileWriter;
use jm_metadata::{
    generate, make_metadata, resolve_job, run_batch, BytecodeNames, Diagnostic, MappingTable,
    MetadataConfig, MetadataJob, MetadataMap,
};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use test_case::test_case;
use zip::write::FileOptions;
use zip::CompressionMethod;

const OBJECT: &str = "java/lang/Object";

fn write_jar(dir: &Path, file_name: &str, classes: &[(&str, Vec<u8>)]) -> PathBuf {
    let path = dir.join(file_name);
    let file = File::create(&path).expect("create jar");
    let mut writer = zip::ZipWriter::new(file);
    let options = FileOptions::default();
    writer
        .start_file("META-INF/MANIFEST.MF", options)
        .expect("start manifest");
    writer
        .write_all(b"Manifest-Version: 1.0\n")
        .expect("write manifest");
    for (name, bytes) in classes {
        writer
            .start_file(format!("{}.class", name), options)
            .expect("start class entry");
        writer.write_all(bytes).expect("write class entry");
    }
    writer.finish().expect("finish jar");
    path
}

fn shape(name: &str, super_name: &str, method: &str) -> Vec<u8> {
    ClassFileWriter::new(name, Some(super_name), ACC_PUBLIC | ACC_SUPER)
        .method(ACC_PUBLIC, method, "()V", |code| {
            code.op(RETURN);
        })
        .finish()
}

fn config(output: &Path) -> MetadataConfig {
    MetadataConfig::new(output).with_jdk_runtime(false)
}

struct Fixture {
    _temp: TempDir,
    out: PathBuf,
    job: MetadataJob,
}

fn fixture() -> Fixture {
    let temp = tempfile::tempdir().expect("tempdir");
    let lib = write_jar(
        temp.path(),
        "lib.jar",
        &[
            ("lib/Widget", shape("lib/Widget", OBJECT, "draw")),
            ("app/Shared", shape("app/Shared", OBJECT, "fromLibrary")),
        ],
    );
    let app = write_jar(
        temp.path(),
        "app.jar",
        &[
            ("app/Button", shape("app/Button", "lib/Widget", "draw")),
            ("app/Shared", shape("app/Shared", OBJECT, "fromApp")),
        ],
    );
    let out = temp.path().join("out");
    let job = MetadataJob::new("app", app).with_libraries([lib]);
    Fixture {
        _temp: temp,
        out,
        job,
    }
}

#[test]
fn primary_classes_shadow_libraries_and_only_they_are_emitted() {
    let fixture = fixture();
    let metadata = generate(&config(&fixture.out), &fixture.job, &BytecodeNames).expect("generate");

    let names: Vec<&String> = metadata.iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["app/Button", "app/Shared"]);

    let shared = metadata.get("app/Shared").expect("shared");
    assert!(shared.methods.contains_key("fromApp()V"));
    assert!(!shared.methods.contains_key("fromLibrary()V"));

    let draw = &metadata.get("app/Button").expect("button").methods["draw()V"];
    assert_eq!(draw.overrides.len(), 1);
    assert_eq!(draw.overrides.iter().next().map(|m| m.owner.as_str()), Some("lib/Widget"));
    assert!(draw.parent.is_none());
}

#[test_case(false, false ; "existing output is kept")]
#[test_case(true, true ; "force regenerates")]
fn make_metadata_respects_force(force: bool, rewritten: bool) {
    let fixture = fixture();
    let first = make_metadata(&config(&fixture.out), &fixture.job, &BytecodeNames)
        .expect("first run")
        .expect("first run writes");
    assert_eq!(first, fixture.out.join("app_meta.json"));

    fs::write(&first, "{}").expect("overwrite marker");
    let second = make_metadata(&config(&fixture.out).with_force(force), &fixture.job, &BytecodeNames)
        .expect("second run");
    assert_eq!(second.is_some(), rewritten);

    let contents = fs::read_to_string(&first).expect("read output");
    assert_eq!(contents != "{}", rewritten);
}

#[test]
fn written_json_matches_generated_map() {
    let fixture = fixture();
    let config = config(&fixture.out);
    let path = make_metadata(&config, &fixture.job, &BytecodeNames)
        .expect("make")
        .expect("written");
    let written = MetadataMap::from_json(&fs::read_to_string(&path).expect("read")).expect("parse json");
    let fresh = generate(&config, &fixture.job, &BytecodeNames).expect("generate");

    assert_eq!(written, fresh);
    assert_eq!(written.fingerprint().unwrap(), fresh.fingerprint().unwrap());
    assert!(fs::read_to_string(&path).unwrap().contains("\"superName\": \"lib/Widget\""));
}

#[test]
fn batch_keeps_going_after_a_failed_job() {
    let fixture = fixture();
    let broken = MetadataJob::new("broken", fixture.out.join("missing.jar"));
    let report = run_batch(
        &config(&fixture.out),
        &[broken, fixture.job.clone()],
        &BytecodeNames,
    );

    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "broken");
    assert_eq!(report.written, vec![fixture.out.join("app_meta.json")]);
    assert!(report.skipped.is_empty());

    let again = run_batch(&config(&fixture.out), &[fixture.job.clone()], &BytecodeNames);
    assert_eq!(again.skipped, vec!["app".to_string()]);
}

#[test]
fn exploded_library_directory_is_a_classpath_entry() {
    let temp = tempfile::tempdir().expect("tempdir");
    let classes = temp.path().join("classes");
    fs::create_dir_all(classes.join("lib")).expect("mkdir");
    fs::write(classes.join("lib/Widget.class"), shape("lib/Widget", OBJECT, "draw")).expect("write class");
    let app = write_jar(
        temp.path(),
        "app.jar",
        &[("app/Button", shape("app/Button", "lib/Widget", "draw"))],
    );

    let job = MetadataJob::new("app", app).with_libraries([classes]);
    let metadata = generate(&config(&temp.path().join("out")), &job, &BytecodeNames).expect("generate");
    let draw = &metadata.get("app/Button").expect("button").methods["draw()V"];
    assert!(draw.overrides.iter().any(|root| root.owner == "lib/Widget"));
}

#[test]
fn obfuscated_enum_uses_mapping_names() {
    let temp = tempfile::tempdir().expect("tempdir");
    let enum_bytes = ClassFileWriter::new("a", Some("java/lang/Enum"), ACC_PUBLIC | ACC_FINAL | ACC_SUPER | ACC_ENUM)
        .field(ACC_PUBLIC | ACC_STATIC | ACC_FINAL | ACC_ENUM, "b", "La;")
        .method(ACC_PUBLIC | ACC_STATIC, "c", "(Ljava/lang/String;)La;", |code| {
            code.op(ACONST_NULL).op(ARETURN);
        })
        .finish();
    let jar = write_jar(temp.path(), "client.jar", &[("a", enum_bytes)]);

    let mut official = MappingTable::new();
    official
        .add_class("net/Mode", "a")
        .add_field("FAST", "b")
        .add_method("valueOf", "(Ljava/lang/String;)Lnet/Mode;", "c");
    let oracle = official.reversed();

    let config = config(&temp.path().join("out")).with_obfuscated(true);
    let metadata = generate(&config, &MetadataJob::new("client", jar), &oracle).expect("generate");
    let mode = metadata.get("a").expect("enum");
    assert_eq!(mode.fields["b"].force.as_deref(), Some("FAST"));
    assert_eq!(mode.methods["c(Ljava/lang/String;)La;"].force.as_deref(), Some("valueOf"));
}

#[test]
fn corrupted_entry_is_missing_while_its_neighbours_load() {
    let temp = tempfile::tempdir().expect("tempdir");
    let good = shape("p/Good", OBJECT, "ok");
    let bad = shape("p/Bad", OBJECT, "broken");

    let path = temp.path().join("main.jar");
    let mut writer = zip::ZipWriter::new(File::create(&path).expect("create jar"));
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in [("p/Good", &good), ("p/Bad", &bad)] {
        writer
            .start_file(format!("{}.class", name), stored)
            .expect("start class entry");
        writer.write_all(bytes).expect("write class entry");
    }
    writer.finish().expect("finish jar");

    // Flip one byte of the stored body so its CRC no longer matches.
    let mut jar = fs::read(&path).expect("read jar");
    let offset = jar
        .windows(bad.len())
        .position(|window| window == bad.as_slice())
        .expect("stored body present");
    jar[offset + bad.len() / 2] ^= 0xFF;
    fs::write(&path, jar).expect("rewrite jar");

    let generation = resolve_job(
        &config(&temp.path().join("out")),
        &MetadataJob::new("main", path),
        &BytecodeNames,
    )
    .expect("damaged entry does not abort the artifact");
    let names: Vec<&String> = generation.metadata.iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["p/Good"]);
    assert!(generation.diagnostics.contains(&Diagnostic::MissingClass {
        class: "p/Bad".to_string()
    }));
}
