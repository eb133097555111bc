//! End-to-end tests of the binding layer against the stub library
//!
//! These drive parsing, traversal, the type relations and disposal through
//! the public API only, and check the stub's counters to make sure every
//! native resource is released exactly once.

mod test_support;

use std::collections::HashSet;

use clangbind_core::{CursorKind, Error, ParseOptions, Severity, TypeKind, UnsavedFile};
use clangbind_stub::StubLibrary;
use pretty_assertions::assert_eq;

#[test]
fn test_function_and_parameter() {
    let index = test_support::stub_index();
    let unit = test_support::parse_source(&index, "identity.c", test_support::IDENTITY);
    let root = unit.cursor().unwrap();
    assert_eq!(root.kind().unwrap(), CursorKind::TRANSLATION_UNIT);

    let f = root
        .children()
        .unwrap()
        .find(|c| c.kind().unwrap() == CursorKind::FUNCTION_DECL)
        .expect("function declaration");
    assert_eq!(f.spelling().unwrap(), "f");

    let x = f
        .children()
        .unwrap()
        .find(|c| c.kind().unwrap() == CursorKind::PARM_DECL)
        .expect("parameter");
    assert_eq!(x.spelling().unwrap(), "x");

    let ty = x.ty().unwrap();
    assert_eq!(ty.kind().unwrap(), TypeKind::INT);
    assert_eq!(ty.spelling().unwrap(), "int");
    assert_eq!(ty.pointee_type().unwrap(), None);
    assert_eq!(ty.declaration().unwrap(), None);
    assert_eq!(ty.canonical_type().unwrap(), ty);

    assert_eq!(f.result_type().unwrap().unwrap(), ty);
    assert_eq!(unit.diagnostics().unwrap().count(), 0);
}

#[test]
fn test_cursor_identity_across_paths() {
    let index = test_support::stub_index();
    let unit = test_support::parse_source(&index, "identity.c", test_support::IDENTITY);
    let root = unit.cursor().unwrap();

    let f = root.children().unwrap().next().unwrap();
    let by_traversal = f.children().unwrap().next().unwrap();
    let by_reference = test_support::descendants(&root)
        .into_iter()
        .find(|c| c.kind().unwrap() == CursorKind::DECL_REF_EXPR)
        .and_then(|c| c.referenced().unwrap())
        .expect("referenced parameter");
    let by_location = unit.cursor_at(&by_traversal.location().unwrap()).unwrap().unwrap();

    assert_eq!(by_traversal, by_reference);
    assert_eq!(by_traversal, by_location);
    let set: HashSet<_> = [by_traversal, by_reference, by_location].into_iter().collect();
    assert_eq!(set.len(), 1);
}

#[test]
fn test_children_restart() {
    let index = test_support::stub_index();
    let unit = test_support::parse_source(&index, "three.c", "int a;\nint b;\nint c(void);\n");
    let root = unit.cursor().unwrap();

    let first: Vec<_> = root.children().unwrap().collect();
    let second: Vec<_> = root.children().unwrap().collect();
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

#[test]
fn test_syntax_error_keeps_unit_usable() {
    let index = test_support::stub_index();
    let unit = test_support::parse_source(&index, "broken.c", "int a = ;\nint b;\n");

    let diagnostics: Vec<_> = unit.diagnostics().unwrap().map(|d| d.unwrap()).collect();
    assert!(!diagnostics.is_empty());
    assert_eq!(diagnostics[0].severity().unwrap(), Severity::ERROR);
    assert_eq!(diagnostics[0].location().unwrap().line().unwrap(), 1);

    let names: Vec<String> = unit
        .cursor()
        .unwrap()
        .children()
        .unwrap()
        .map(|c| c.spelling().unwrap())
        .collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_file_and_location_lookup() {
    let index = test_support::stub_index();
    let source = "int red;\nint\n  green;\n";
    let unit = test_support::parse_source(&index, "colours.h", source);
    assert_eq!(unit.spelling().unwrap(), "colours.h");
    assert_eq!(unit.to_string(), "colours.h");

    let file = unit.file("colours.h").unwrap().expect("file");
    assert_eq!(file.name().unwrap(), "colours.h");
    assert_eq!(file.to_string(), "colours.h");
    assert!(file == file.clone());

    let location = unit.location(&file, 3, 2).unwrap();
    let position = location.expansion().unwrap();
    assert_eq!(position.file.unwrap().name().unwrap(), "colours.h");
    assert_eq!((position.line, position.column, position.offset), (3, 2, 14));

    let green = unit.cursor_at(&unit.location(&file, 3, 3).unwrap()).unwrap().unwrap();
    assert_eq!(green.spelling().unwrap(), "green");
    assert_eq!(unit.diagnostics().unwrap().count(), 0);
}

#[test]
fn test_disposal_cascade() {
    const UNITS: usize = 5;
    let index = test_support::stub_index();
    let units: Vec<_> = (0..UNITS)
        .map(|i| test_support::parse_source(&index, &format!("u{}.c", i), test_support::IDENTITY))
        .collect();
    let roots: Vec<_> = units.iter().map(|u| u.cursor().unwrap()).collect();
    assert_eq!(index.translation_units_alive(), UNITS);

    index.dispose();
    assert_eq!(index.translation_units_alive(), 0);
    assert!(units.iter().all(|u| u.is_disposed()));
    for root in &roots {
        assert!(matches!(root.kind(), Err(Error::UseAfterDispose { .. })));
    }

    // dropping everything afterwards releases nothing twice
    drop(roots);
    drop(units);
    drop(index);
    let counters = clangbind_stub::counters();
    assert_eq!(counters.units_created, UNITS);
    assert_eq!(counters.units_disposed, UNITS);
    assert_eq!(counters.indexes_disposed, 1);
    assert_eq!(counters.double_disposals, 0);
    assert_eq!(counters.indexes_disposed_with_live_units, 0);
    assert!(counters.balanced());
}

#[test]
fn test_units_keep_index_alive() {
    let index = test_support::stub_index();
    let unit = test_support::parse_source(&index, "kept.c", test_support::IDENTITY);
    drop(index);
    assert_eq!(unit.cursor().unwrap().children().unwrap().count(), 1);
    assert_eq!(clangbind_stub::counters().indexes_disposed, 0);

    drop(unit);
    let counters = clangbind_stub::counters();
    assert_eq!(counters.indexes_disposed, 1);
    assert_eq!(counters.indexes_disposed_with_live_units, 0);
}

#[test]
fn test_invalid_text_releases_string() {
    let index = test_support::stub_index();
    let mut source = b"int caf".to_vec();
    source.extend_from_slice(&[0xff, 0xfe]);
    source.extend_from_slice(b";\nint ok;\n");
    let unit = test_support::parse_source(&index, "bytes.c", source);

    let decls: Vec<_> = unit.cursor().unwrap().children().unwrap().collect();
    let err = decls[0].spelling().unwrap_err();
    assert!(matches!(err, Error::InvalidText { .. }), "{:?}", err);
    assert_eq!(decls[1].spelling().unwrap(), "ok");
    assert_eq!(clangbind_stub::counters().live_strings(), 0);
}

#[test]
fn test_missing_function_is_per_field() {
    let index = test_support::index_on(StubLibrary::new().with_version(3, 2));
    let unit = test_support::parse_source(&index, "old.c", test_support::IDENTITY);
    let f = unit.cursor().unwrap().children().unwrap().next().unwrap();

    // the type is there, its spelling needs 3.3
    let ty = f.ty().unwrap();
    assert_eq!(ty.kind().unwrap(), TypeKind::FUNCTION_PROTO);
    match ty.spelling().unwrap_err() {
        Error::MissingFunction {
            function,
            min_version,
            loaded_version,
        } => {
            assert_eq!(function.symbol(), "clang_getTypeSpelling");
            assert_eq!(min_version.to_string(), "3.3");
            assert_eq!(loaded_version.to_string(), "3.2");
        }
        other => panic!("expected MissingFunction, got {:?}", other),
    }
    assert_eq!(f.spelling().unwrap(), "f");
}

#[test]
fn test_reparse_replaces_tree() {
    let index = test_support::stub_index();
    let unit = test_support::parse_source(&index, "edit.c", "int a;\n");
    unit.reparse(&[UnsavedFile::new("edit.c", "int a;\nint b;\n")]).unwrap();
    assert_eq!(unit.cursor().unwrap().children().unwrap().count(), 2);
}

#[test]
fn test_wrappers_held_across_reparse_fail() {
    let index = test_support::stub_index();
    let unit = test_support::parse_source(&index, "held.c", "int alpha = ;\nint beta;\n");
    let beta = unit.cursor().unwrap().children().unwrap().nth(1).expect("beta");
    assert_eq!(beta.spelling().unwrap(), "beta");
    let diagnostic = unit.diagnostics().unwrap().next().expect("diagnostic").unwrap();

    unit.reparse(&[UnsavedFile::new("held.c", "int gamma(int delta) { return delta; }\n")])
        .unwrap();

    match beta.spelling() {
        Err(Error::Stale { object }) => assert_eq!(object, "cursor"),
        other => panic!("expected Stale, got {:?}", other),
    }
    assert!(matches!(beta.ty(), Err(Error::Stale { .. })));
    assert!(matches!(diagnostic.severity(), Err(Error::Stale { object: "diagnostic" })));
    assert_eq!(unit.diagnostics().unwrap().count(), 0);

    let gamma = unit.cursor().unwrap().children().unwrap().next().expect("gamma");
    assert_eq!(gamma.spelling().unwrap(), "gamma");

    drop(diagnostic);
    drop(beta);
    drop(gamma);
    drop(unit);
    drop(index);
    let counters = clangbind_stub::counters();
    assert_eq!(counters.double_disposals, 0);
    assert!(counters.balanced(), "{:?}", counters);
}

#[test]
fn test_parse_options_pass_through() {
    let index = test_support::stub_index();
    let unit = index
        .parse(
            Some("opts.c"),
            &["-std=c11"],
            &[UnsavedFile::new("opts.c", test_support::IDENTITY)],
            ParseOptions::DETAILED_PREPROCESSING_RECORD | ParseOptions::SKIP_FUNCTION_BODIES,
        )
        .unwrap();
    assert_eq!(unit.spelling().unwrap(), "opts.c");
    assert_eq!(clangbind_stub::last_parse_args(), vec!["-std=c11".to_string()]);
}
