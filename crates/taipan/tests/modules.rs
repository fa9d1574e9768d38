//! Import machinery and file-object tests; these touch the real filesystem
//! under a per-test temporary directory.

use std::{fs, path::PathBuf};

use pretty_assertions::assert_eq;
use taipan::{CollectStringPrint, InterpOptions, Interpreter};

/// Creates a unique scratch directory for one test.
fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("taipan-test-{tag}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn interp_with_capture(dir: &PathBuf) -> (Interpreter, CollectStringPrint) {
    let collector = CollectStringPrint::new();
    let interp = Interpreter::with_options(InterpOptions {
        search_paths: vec![dir.clone()],
        printer: Box::new(collector.clone()),
        ..InterpOptions::default()
    });
    (interp, collector)
}

#[test]
fn test_import_module_and_cache() {
    let dir = scratch_dir("import");
    fs::write(
        dir.join("helper.py"),
        "print('loading helper')\nVALUE = 41\ndef bump(x):\n    return x + 1\n",
    )
    .unwrap();

    let (mut interp, collector) = interp_with_capture(&dir);
    let source = "\
import helper
print(helper.VALUE)
print(helper.bump(helper.VALUE))
import helper
print('done')
";
    interp.run(source).unwrap();
    // The module body executes once; the second import hits the cache.
    assert_eq!(collector.take(), "loading helper\n41\n42\ndone\n");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_from_import_and_star() {
    let dir = scratch_dir("from-import");
    fs::write(
        dir.join("shapes.py"),
        "side = 3\ndef area(s):\n    return s * s\n_private = 'hidden'\n",
    )
    .unwrap();

    let (mut interp, collector) = interp_with_capture(&dir);
    interp
        .run("from shapes import area, side\nprint(area(side))")
        .unwrap();
    assert_eq!(collector.take(), "9\n");

    let (mut interp, collector) = interp_with_capture(&dir);
    let err = interp
        .run("from shapes import *\nprint(area(2))\nprint(_private)")
        .unwrap_err();
    // Star import copies only public names.
    assert_eq!(collector.take(), "4\n");
    assert_eq!(err.to_string(), "NameError: name '_private' is not defined");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_package_init_and_missing_module() {
    let dir = scratch_dir("package");
    fs::create_dir_all(dir.join("pkg")).unwrap();
    fs::write(dir.join("pkg").join("__init__.py"), "NAME = 'pkg'\n").unwrap();

    let (mut interp, collector) = interp_with_capture(&dir);
    interp.run("import pkg\nprint(pkg.NAME)").unwrap();
    assert_eq!(collector.take(), "pkg\n");

    let (mut interp, _collector) = interp_with_capture(&dir);
    let err = interp.run("import missing_module").unwrap_err();
    assert_eq!(err.to_string(), "ImportError: No module named 'missing_module'");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_import_error_is_catchable() {
    let dir = scratch_dir("catch-import");
    let (mut interp, collector) = interp_with_capture(&dir);
    interp
        .run("try:\n    import nothing_here\nexcept ImportError:\n    print('no module')")
        .unwrap();
    assert_eq!(collector.take(), "no module\n");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_run_file_sets_search_path() {
    let dir = scratch_dir("run-file");
    fs::write(dir.join("util.py"), "def twice(x):\n    return 2 * x\n").unwrap();
    fs::write(
        dir.join("main.py"),
        "import util\nprint(util.twice(21))\n",
    )
    .unwrap();

    let collector = CollectStringPrint::new();
    let mut interp = Interpreter::with_options(InterpOptions {
        printer: Box::new(collector.clone()),
        ..InterpOptions::default()
    });
    interp.run_file(dir.join("main.py")).unwrap();
    assert_eq!(collector.take(), "42\n");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_file_read_write_and_context_manager() {
    let dir = scratch_dir("files");
    let data = dir.join("data.txt");
    fs::write(&data, "line one\nline two\n").unwrap();

    let (mut interp, collector) = interp_with_capture(&dir);
    let source = format!(
        "\
with open('{path}') as f:
    print(f.read())
f2 = open('{path}')
print(f2.readline())
print(f2.readline())
f2.close()
try:
    f2.read()
except ValueError as e:
    print(e.message)
",
        path = data.display()
    );
    interp.run(&source).unwrap();
    assert_eq!(
        collector.take(),
        "line one\nline two\n\nline one\n\nline two\n\nI/O operation on closed file\n"
    );

    let out = dir.join("out.txt");
    let (mut interp, collector) = interp_with_capture(&dir);
    let source = format!(
        "\
with open('{path}', 'w') as f:
    n = f.write('hello\\n')
print(n)
with open('{path}') as f:
    print(f.read())
",
        path = out.display()
    );
    interp.run(&source).unwrap();
    assert_eq!(collector.take(), "6\nhello\n\n");
    assert_eq!(fs::read_to_string(&out).unwrap(), "hello\n");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_file_closed_on_exception_path() {
    let dir = scratch_dir("file-exc");
    let data = dir.join("data.txt");
    fs::write(&data, "content").unwrap();

    let (mut interp, collector) = interp_with_capture(&dir);
    let source = format!(
        "\
f = None
try:
    with open('{path}') as g:
        f = g
        raise ValueError('stop')
except ValueError:
    pass
print(f.closed)
",
        path = data.display()
    );
    interp.run(&source).unwrap();
    assert_eq!(collector.take(), "True\n");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_missing_file_raises() {
    let dir = scratch_dir("missing-file");
    let (mut interp, _collector) = interp_with_capture(&dir);
    let err = interp.run("open('/definitely/not/here.txt')").unwrap_err();
    assert_eq!(
        err.to_string(),
        "FileNotFoundError: [Errno 2] No such file or directory: '/definitely/not/here.txt'"
    );
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_module_scopes_are_isolated() {
    let dir = scratch_dir("isolated");
    fs::write(dir.join("counter_mod.py"), "count = 0\n").unwrap();

    let (mut interp, collector) = interp_with_capture(&dir);
    let source = "\
import counter_mod
count = 'main'
counter_mod.count = 5
print(count, counter_mod.count)
";
    interp.run(source).unwrap();
    assert_eq!(collector.take(), "main 5\n");
    let _ = fs::remove_dir_all(&dir);
}
