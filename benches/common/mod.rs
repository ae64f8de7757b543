#![allow(dead_code)]
use std::fs;
use std::path::{Path, PathBuf};

use kalc::ast::Program;
use kalc::parser::ParseOptions;

/// Fixture programs whose `case.yaml` opts into benchmarking.
pub fn workloads() -> Vec<(String, PathBuf)> {
    test_support::load_cases(Path::new("tests/programs"))
        .unwrap_or_else(|err| panic!("load cases: {err}"))
        .into_iter()
        .filter(|case| case.spec.bench.enabled)
        .map(|case| (case.name, case.program_path))
        .collect()
}

pub fn load_source(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| panic!("read {}: {err}", path.display()))
}

pub fn load_program(path: &Path) -> Program {
    let source = load_source(path);
    kalc::parse(&source, &ParseOptions::default())
        .unwrap_or_else(|err| panic!("parse {}: {err}", path.display()))
}
