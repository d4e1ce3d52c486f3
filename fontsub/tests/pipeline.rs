//! Whole builds, from stylesheet text to rewritten output, with stand-in subsetters.

use std::{
    collections::BTreeSet,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use clap::Parser;
use fontsub::{
    run, AliasTable, Args, Asset, Build, Bundle, Config, FsHost, Replacement, RewriteMode,
    SubsetError, Subsetter, TargetFormat,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rayon::prelude::*;
use tempfile::{tempdir, TempDir};

const FONT_SIZE: usize = 1000;

/// Shrinks fonts to a fixed fraction of their size, remembering what it was asked for.
struct Scaling {
    ratio: f64,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<BTreeSet<u32>>>,
}

impl Scaling {
    fn new(ratio: f64) -> Arc<Scaling> {
        Arc::new(Scaling {
            ratio,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn slow(ratio: f64) -> Arc<Scaling> {
        Arc::new(Scaling {
            ratio,
            delay: Duration::from_millis(25),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Subsetter for Scaling {
    fn subset(
        &self,
        font: &[u8],
        code_points: &BTreeSet<u32>,
        _format: TargetFormat,
    ) -> Result<Vec<u8>, SubsetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(code_points.clone());
        std::thread::sleep(self.delay);
        Ok(vec![0; (font.len() as f64 * self.ratio) as usize])
    }
}

struct Failing;

impl Subsetter for Failing {
    fn subset(
        &self,
        _font: &[u8],
        _code_points: &BTreeSet<u32>,
        _format: TargetFormat,
    ) -> Result<Vec<u8>, SubsetError> {
        Err(SubsetError::NothingToKeep)
    }
}

/// A temp directory holding `files`, each a font of [`FONT_SIZE`] bytes.
fn project(files: &[&str]) -> TempDir {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = tempdir().unwrap();
    for file in files {
        let path = temp_dir.path().join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![1; FONT_SIZE]).unwrap();
    }
    temp_dir
}

fn config(root: &Path) -> Config {
    Config {
        cache_dir: Some(root.join("build/fonts")),
        public_path: Some("/fonts".to_string()),
        ..Default::default()
    }
}

fn build(root: &Path, subsetter: Arc<dyn Subsetter>) -> Build {
    Build::new(&config(root), Arc::new(FsHost::default()), subsetter).unwrap()
}

fn font_face(src: &str, unicode_range: &str) -> String {
    format!(
        "@font-face {{\n  font-family: \"Test\";\n  src: {src};\n  unicode-range: {unicode_range};\n}}\n"
    )
}

#[test]
fn digits_subset_end_to_end() {
    let temp_dir = project(&["css/font.woff2"]);
    let root = temp_dir.path();
    let subsetter = Scaling::new(0.4);
    let build = build(root, subsetter.clone());

    let text = font_face(r#"url(font.woff2) format("woff2")"#, "U+0030-0039");
    let rewritten = build.transform(&root.join("css/digits.css"), &text);

    assert_eq!(
        text.replace("url(font.woff2)", "url(/fonts/font.subset.woff2)"),
        rewritten
    );
    assert_eq!(
        vec![(0x30..=0x39).collect::<BTreeSet<u32>>()],
        *subsetter.requests.lock()
    );

    let entries = build.entries();
    assert_eq!(1, entries.len());
    let entry = &entries[0];
    assert!(entry.accepted);
    assert_eq!((FONT_SIZE, 400), (entry.original_size, entry.subset_size));
    assert_eq!(
        400,
        fs::read(root.join("build/fonts/font.subset.woff2"))
            .unwrap()
            .len()
    );

    let report = build.finish();
    assert_eq!(1, report.len());
    assert_eq!("font.woff2", report[0].name);
    assert!(
        (report[0].reduction_percent - 60.0).abs() < 0.01,
        "{report:?}"
    );
    assert_eq!(("1.00 kB", "400 B"), (report[0].before.as_str(), report[0].after.as_str()));
}

#[test]
fn no_smaller_no_rewrite() {
    let temp_dir = project(&["css/font.woff2"]);
    let root = temp_dir.path();
    for ratio in [1.0, 1.5] {
        let build = build(root, Scaling::new(ratio));
        let text = font_face("url(font.woff2)", "U+0030-0039");
        assert_eq!(text, build.transform(&root.join("css/main.css"), &text));

        let entries = build.entries();
        assert_eq!(1, entries.len());
        assert!(!entries[0].accepted);
        assert_eq!(None, entries[0].output_location);
        assert!(build.finish().is_empty());
    }
    assert!(!root.join("build/fonts/font.subset.woff2").exists());
}

#[test]
fn failed_subsetting_leaves_the_original() {
    let temp_dir = project(&["css/font.woff2"]);
    let root = temp_dir.path();
    let build = build(root, Arc::new(Failing));
    let text = font_face("url(font.woff2)", "U+0030-0039");
    assert_eq!(text, build.transform(&root.join("css/main.css"), &text));
    assert!(build.entries().is_empty());
}

#[test]
fn unparseable_stylesheet_passes_through() {
    let temp_dir = project(&["css/font.woff2"]);
    let root = temp_dir.path();
    let subsetter = Scaling::new(0.4);
    let build = build(root, subsetter.clone());
    let text = "@font-face { src: url(font.woff2); unicode-range: U+30-39; font-family: A;";
    assert!(build.analyze(&root.join("css/main.css"), text).is_err());
    assert_eq!(text, build.transform(&root.join("css/main.css"), text));
    assert_eq!(0, subsetter.calls());
}

#[test]
fn unresolvable_url_does_not_stop_the_rest() {
    let temp_dir = project(&["css/font.woff"]);
    let root = temp_dir.path();
    let build = build(root, Scaling::new(0.4));
    let text = font_face(
        "url(missing.woff2) format(\"woff2\"), url(font.woff) format(\"woff\")",
        "U+41",
    );
    let rewritten = build.transform(&root.join("css/main.css"), &text);
    assert_eq!(
        text.replace("url(font.woff)", "url(/fonts/font.subset.woff)"),
        rewritten
    );
}

#[test]
fn only_local_font_files_are_subset() {
    let temp_dir = project(&["css/font.woff2", "css/font.svg"]);
    let root = temp_dir.path();
    let subsetter = Scaling::new(0.4);
    let build = build(root, subsetter.clone());
    let text = font_face(
        "local(Test), url(font.svg#Test) format(\"svg\"), url(https://example.com/a.woff2), url(font.woff2)",
        "U+41",
    );
    let replacements = build.analyze(&root.join("css/main.css"), &text).unwrap();
    assert_eq!(
        vec!["font.woff2"],
        replacements
            .iter()
            .map(|r| r.original.as_str())
            .collect::<Vec<_>>()
    );
    assert_eq!(1, subsetter.calls());
}

#[test]
fn rules_without_unicode_range_are_ignored() {
    let temp_dir = project(&["css/font.woff2"]);
    let root = temp_dir.path();
    let subsetter = Scaling::new(0.4);
    let build = build(root, subsetter.clone());
    let text = "@font-face { font-family: A; src: url(font.woff2); }";
    assert_eq!(text, build.transform(&root.join("css/main.css"), text));
    assert_eq!(0, subsetter.calls());
}

#[test]
fn concurrent_stylesheets_subset_once() {
    let temp_dir = project(&["fonts/shared.woff2"]);
    let root = temp_dir.path();
    let subsetter = Scaling::slow(0.4);
    let build = build(root, subsetter.clone());

    let stylesheets: Vec<(PathBuf, String)> = (0..32u32)
        .map(|i| {
            (
                root.join(format!("css/{i}.css")),
                font_face("url(../fonts/shared.woff2)", &format!("U+{:04X}", 0x41 + i)),
            )
        })
        .collect();
    let results: Vec<Vec<Replacement>> = stylesheets
        .par_iter()
        .map(|(path, text)| build.analyze(path, text).unwrap())
        .collect();

    assert_eq!(1, subsetter.calls());
    let first = &results[0][0];
    for replacements in results.iter() {
        assert_eq!(1, replacements.len());
        assert!(Arc::ptr_eq(&first.entry, &replacements[0].entry));
        assert_eq!("/fonts/shared.subset.woff2", replacements[0].location);
    }
}

#[test]
fn first_declaration_decides_the_subset() {
    let temp_dir = project(&["fonts/shared.woff2"]);
    let root = temp_dir.path();
    let subsetter = Scaling::new(0.4);
    let build = build(root, subsetter.clone());

    let letters = font_face("url(../fonts/shared.woff2)", "U+0041-0042");
    let digits = font_face("url(../fonts/shared.woff2)", "U+0030-0039");
    let a = build.transform(&root.join("css/a.css"), &letters);
    let b = build.transform(&root.join("css/b.css"), &digits);

    assert_eq!(
        vec![BTreeSet::from([0x41, 0x42])],
        *subsetter.requests.lock()
    );
    let expected = "url(/fonts/shared.subset.woff2)";
    assert!(a.contains(expected), "{a}");
    assert!(b.contains(expected), "{b}");
}

#[test]
fn each_build_starts_fresh() {
    let temp_dir = project(&["css/font.woff2"]);
    let root = temp_dir.path();
    let subsetter = Scaling::new(0.4);
    let text = font_face("url(font.woff2)", "U+0041");

    for expected_calls in 1..=2 {
        let build = build(root, subsetter.clone());
        build.transform(&root.join("css/main.css"), &text);
        build.transform(&root.join("css/main.css"), &text);
        assert_eq!(expected_calls, subsetter.calls());
        assert_eq!(1, build.finish().len());
    }
}

#[test]
fn transform_is_idempotent() {
    let temp_dir = project(&["css/font.woff2"]);
    let root = temp_dir.path();
    let build = build(root, Scaling::new(0.4));
    let path = root.join("css/main.css");
    let text = font_face("url(./font.woff2)", "U+0041-005A");

    let once = build.transform(&path, &text);
    let twice = build.transform(&path, &once);
    assert_ne!(text, once);
    assert_eq!(once, twice);
}

#[test]
fn aliases_point_at_subsets() {
    let temp_dir = project(&["css/font.woff2", "css/rejected.woff2"]);
    let root = temp_dir.path();
    let build = build(root, Scaling::new(0.4));
    let text = font_face("url(font.woff2)", "U+0041");
    let path = root.join("css/main.css");

    let mut aliases = AliasTable::new();
    build.add_aliases(&path, &text, &mut aliases);
    build.add_aliases(&path, &text, &mut aliases);
    build.add_aliases(&path, "@font-face {", &mut aliases);

    assert_eq!(1, aliases.len());
    assert_eq!(Some("/fonts/font.subset.woff2"), aliases.resolve("font.woff2"));
}

#[test]
fn skipped_fonts_get_no_alias() {
    let temp_dir = project(&["css/font.woff2"]);
    let root = temp_dir.path();
    let build = build(root, Scaling::new(2.0));
    let mut aliases = AliasTable::new();
    build.add_aliases(
        &root.join("css/main.css"),
        &font_face("url(font.woff2)", "U+0041"),
        &mut aliases,
    );
    assert!(aliases.is_empty());
}

fn emitted_bundle() -> Bundle {
    let mut bundle = Bundle::new();
    bundle.insert(
        "assets/index-4f2a9c1b.css",
        Asset::new(
            "@font-face{font-family:A;src:url(/assets/font-3f9a2b1c.woff2) format(\"woff2\");unicode-range:U+30-39}",
        ),
    );
    bundle.insert("assets/font-3f9a2b1c.woff2", Asset::new(vec![1; FONT_SIZE]));
    bundle.insert("assets/other-77aa11bb.woff2", Asset::new(vec![2; FONT_SIZE]));
    bundle
}

#[test]
fn bundle_fonts_are_replaced_in_place() {
    let temp_dir = project(&[]);
    let root = temp_dir.path();
    let subsetter = Scaling::new(0.4);
    let build = build(root, subsetter.clone());
    let mut bundle = emitted_bundle();
    let before = bundle.clone();

    let changed = build.rewrite_bundle(&mut bundle);

    assert_eq!(vec!["assets/font-3f9a2b1c.woff2".to_string()], changed);
    assert_eq!(
        400,
        bundle.get("assets/font-3f9a2b1c.woff2").unwrap().source.len()
    );
    for name in ["assets/index-4f2a9c1b.css", "assets/other-77aa11bb.woff2"] {
        assert_eq!(before.get(name), bundle.get(name));
    }

    // again, nothing left to do
    let after = bundle.clone();
    assert!(build.rewrite_bundle(&mut bundle).is_empty());
    assert_eq!(after, bundle);
    assert_eq!(1, subsetter.calls());
}

fn args(parts: Vec<OsString>) -> Args {
    let mut argv = vec![OsString::from("fontsub")];
    argv.extend(parts);
    Args::try_parse_from(argv).unwrap()
}

#[test]
fn run_inline_writes_rewritten_css() {
    let temp_dir = project(&["css/fonts/font.woff2"]);
    let root = temp_dir.path();
    let text = font_face("url(./fonts/font.woff2)", "U+0041");
    fs::write(root.join("css/main.css"), &text).unwrap();
    fs::write(root.join("css/notes.txt"), "not a stylesheet").unwrap();

    let args = args(vec![
        "--input".into(),
        root.join("css").into(),
        "--build-dir".into(),
        root.join("build").into(),
        "--public-path".into(),
        "/fonts".into(),
    ]);
    assert_eq!(RewriteMode::Inline, args.mode);
    let config = Config::from_args(&args).unwrap();
    let report = run(&args, &config, Scaling::new(0.4)).unwrap();

    assert_eq!(1, report.len());
    assert_eq!(
        text.replace("./fonts/font.woff2", "/fonts/font.subset.woff2"),
        fs::read_to_string(root.join("build/css/main.css")).unwrap()
    );
    assert!(!root.join("build/css/notes.txt").exists());
    assert!(root.join("build/fonts/font.subset.woff2").is_file());
}

/// The first `url(...)` in `css`.
fn first_url(css: &str) -> &str {
    let start = css.find("url(").unwrap() + "url(".len();
    let end = start + css[start..].find(')').unwrap();
    &css[start..end]
}

#[test]
fn inline_urls_resolve_from_the_written_stylesheet() {
    let temp_dir = project(&["css/fonts/font.woff2"]);
    let root = temp_dir.path();
    fs::write(
        root.join("css/main.css"),
        font_face("url(./fonts/font.woff2)", "U+0041"),
    )
    .unwrap();
    fs::create_dir_all(root.join("css/theme")).unwrap();
    fs::write(
        root.join("css/theme/dark.css"),
        font_face("url(../fonts/font.woff2)", "U+0042"),
    )
    .unwrap();

    // no public path
    let args = args(vec![
        "--input".into(),
        root.join("css").into(),
        "--build-dir".into(),
        root.join("build").into(),
    ]);
    let config = Config::from_args(&args).unwrap();
    run(&args, &config, Scaling::new(0.4)).unwrap();

    for (written, expected_url) in [
        ("build/css/main.css", "../fonts/font.subset.woff2"),
        ("build/css/theme/dark.css", "../../fonts/font.subset.woff2"),
    ] {
        let written = root.join(written);
        let css = fs::read_to_string(&written).unwrap();
        let url = first_url(&css);
        assert_eq!(expected_url, url);
        assert!(
            written.parent().unwrap().join(url).is_file(),
            "{url} doesn't resolve from {written:?}"
        );
    }
}

#[test]
fn unreadable_stylesheet_does_not_stop_the_build() {
    let temp_dir = project(&["css/font.woff2"]);
    let root = temp_dir.path();
    let good = font_face("url(font.woff2)", "U+0041");
    let bad = b"\xff\xfe a { color: red }".to_vec();
    fs::write(root.join("css/a.css"), &good).unwrap();
    fs::write(root.join("css/b.css"), &bad).unwrap();

    let inline = args(vec![
        "--input".into(),
        root.join("css").into(),
        "--build-dir".into(),
        root.join("build").into(),
        "--public-path".into(),
        "/fonts".into(),
    ]);
    let config = Config::from_args(&inline).unwrap();
    let report = run(&inline, &config, Scaling::new(0.4)).unwrap();

    assert_eq!(1, report.len());
    assert_eq!(
        good.replace("url(font.woff2)", "url(/fonts/font.subset.woff2)"),
        fs::read_to_string(root.join("build/css/a.css")).unwrap()
    );
    assert_eq!(bad, fs::read(root.join("build/css/b.css")).unwrap());

    let mut alias = inline.clone();
    alias.mode = RewriteMode::Alias;
    let report = run(&alias, &config, Scaling::new(0.4)).unwrap();
    assert_eq!(1, report.len());
    let yml = fs::read_to_string(root.join("build/aliases.yml")).unwrap();
    let aliases: AliasTable = serde_yaml::from_str(&yml).unwrap();
    assert_eq!(Some("/fonts/font.subset.woff2"), aliases.resolve("font.woff2"));
}

#[test]
fn run_alias_writes_a_table() {
    let temp_dir = project(&["css/font.woff2"]);
    let root = temp_dir.path();
    fs::write(
        root.join("css/main.scss"),
        format!("// fonts\n{}", font_face("url(font.woff2)", "U+0041")),
    )
    .unwrap();

    let args = args(vec![
        "--input".into(),
        root.join("css").into(),
        "--build-dir".into(),
        root.join("build").into(),
        "--mode".into(),
        "alias".into(),
    ]);
    let config = Config::from_args(&args).unwrap();
    run(&args, &config, Scaling::new(0.4)).unwrap();

    let yml = fs::read_to_string(root.join("build/aliases.yml")).unwrap();
    let aliases: AliasTable = serde_yaml::from_str(&yml).unwrap();
    let location = aliases.resolve("font.woff2").unwrap();
    assert!(location.ends_with("build/fonts/font.subset.woff2"), "{location}");
}

#[test]
fn run_bundle_overwrites_assets() {
    let temp_dir = project(&[]);
    let root = temp_dir.path();
    let dist = root.join("dist");
    for (name, asset) in emitted_bundle().iter() {
        let path = dist.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, &asset.source).unwrap();
    }

    let args = args(vec![
        "--input".into(),
        dist.clone().into(),
        "--build-dir".into(),
        root.join("build").into(),
        "--mode".into(),
        "bundle".into(),
    ]);
    let config = Config::from_args(&args).unwrap();
    let report = run(&args, &config, Scaling::new(0.4)).unwrap();

    assert_eq!(1, report.len());
    assert_eq!(
        400,
        fs::read(dist.join("assets/font-3f9a2b1c.woff2")).unwrap().len()
    );
    assert_eq!(
        FONT_SIZE,
        fs::read(dist.join("assets/other-77aa11bb.woff2")).unwrap().len()
    );
}
