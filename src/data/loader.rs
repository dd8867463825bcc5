use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Deserialize;

use crate::data::dataset::{one_hot_to_label, Dataset, Example};
use crate::error::{NnError, Result, SourceFailure};

/// One record as written by the sample-collection tool:
/// `{"input": [[...pixels]], "target": [[...one-hot]]}`.
#[derive(Debug, Deserialize)]
struct RawRecord {
    input: Vec<Vec<f64>>,
    target: Vec<Vec<f64>>,
}

/// Examples accepted from one source file.
#[derive(Debug, Clone)]
pub struct SourceSummary {
    pub path: PathBuf,
    pub examples: usize,
}

/// What a load produced, per source and in aggregate.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub sources: Vec<SourceSummary>,
    pub failures: Vec<SourceFailure>,
    pub class_counts: BTreeMap<usize, usize>,
    pub total_examples: usize,
}

#[derive(Debug, Clone)]
pub struct LoadedData {
    pub dataset: Dataset,
    pub report: LoadReport,
}

struct ParsedSource {
    examples: Vec<Example>,
    input_size: Option<usize>,
    num_targets: Option<usize>,
}

/// Loads every `*.json` file directly inside `dir`, in lexical filename order.
pub fn load_dir(dir: impl AsRef<Path>) -> Result<LoadedData> {
    let dir = dir.as_ref();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot read training data folder '{}': {}", dir.display(), e);
            return Err(NnError::NoData {
                failures: vec![SourceFailure { path: dir.to_path_buf(), reason: e.to_string() }],
            });
        }
    };

    let (paths, failures) = json_sources(dir, entries.map(|entry| entry.map(|e| e.path())));
    if paths.is_empty() {
        tracing::warn!("No JSON files found in '{}'", dir.display());
    }
    merge_sources(&paths, failures)
}

/// Keeps the `*.json` files among directory entries. An entry that cannot be
/// read becomes a failure instead of ending the walk.
fn json_sources<I>(dir: &Path, entries: I) -> (Vec<PathBuf>, Vec<SourceFailure>)
where
    I: IntoIterator<Item = std::io::Result<PathBuf>>,
{
    let mut paths = Vec::new();
    let mut failures = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => {
                if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
                    paths.push(path);
                }
            }
            Err(e) => {
                tracing::warn!("Skipping unreadable entry in '{}': {}", dir.display(), e);
                failures.push(SourceFailure { path: dir.to_path_buf(), reason: e.to_string() });
            }
        }
    }
    (paths, failures)
}

/// Loads and merges the given source files.
///
/// Sources are parsed in parallel but merged in lexical path order, so the
/// resulting dataset does not depend on scheduling. A source that cannot be
/// read, is not valid JSON, or holds a malformed record is skipped with a
/// warning and listed in the report. Fails with `NoData` only when no
/// source contributed a single example.
pub fn load_sources(paths: &[PathBuf]) -> Result<LoadedData> {
    merge_sources(paths, Vec::new())
}

/// `load_sources`, starting from failures already met while listing sources.
fn merge_sources(paths: &[PathBuf], failures: Vec<SourceFailure>) -> Result<LoadedData> {
    let mut ordered: Vec<PathBuf> = paths.to_vec();
    ordered.sort();

    let parsed: Vec<(PathBuf, Result<ParsedSource>)> = ordered
        .into_par_iter()
        .map(|path| {
            let result = parse_source(&path);
            (path, result)
        })
        .collect();

    let mut report = LoadReport { failures, ..LoadReport::default() };
    let mut examples = Vec::new();
    let mut input_size: Option<usize> = None;
    let mut num_targets: Option<usize> = None;

    for (path, result) in parsed {
        let source = match result.and_then(|s| check_against(s, input_size, num_targets)) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("Skipping '{}': {}", path.display(), e);
                report.failures.push(SourceFailure { path, reason: e.to_string() });
                continue;
            }
        };

        input_size = input_size.or(source.input_size);
        num_targets = num_targets.or(source.num_targets);
        tracing::info!("Loaded {} examples from {}", source.examples.len(), path.display());
        report.sources.push(SourceSummary { path, examples: source.examples.len() });
        examples.extend(source.examples);
    }

    let num_targets = match num_targets {
        Some(n) if !examples.is_empty() => n,
        _ => return Err(NnError::NoData { failures: report.failures }),
    };

    let dataset = Dataset::new(examples, num_targets)?;
    report.class_counts = dataset.class_counts();
    report.total_examples = dataset.len();
    log_summary(&report);

    Ok(LoadedData { dataset, report })
}

fn parse_source(path: &Path) -> Result<ParsedSource> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let records: Vec<RawRecord> = serde_json::from_reader(reader)?;

    let mut input_size = None;
    let mut num_targets = None;
    let mut examples = Vec::with_capacity(records.len());

    for (index, record) in records.into_iter().enumerate() {
        let input = single_row(record.input, "input", index)?;
        let target = single_row(record.target, "target", index)?;

        let expected_input = *input_size.get_or_insert(input.len());
        if input.len() != expected_input {
            return Err(NnError::shape(format!("input of record {index}"), expected_input, input.len()));
        }
        let expected_targets = *num_targets.get_or_insert(target.len());
        if target.len() != expected_targets {
            return Err(NnError::shape(format!("target of record {index}"), expected_targets, target.len()));
        }

        let label = one_hot_to_label(&target, index)?;
        examples.push(Example { input, label });
    }

    Ok(ParsedSource { examples, input_size, num_targets })
}

/// Unwraps the singleton outer sequence of an `input`/`target` field.
fn single_row(mut rows: Vec<Vec<f64>>, field: &str, index: usize) -> Result<Vec<f64>> {
    if rows.len() != 1 {
        return Err(NnError::shape(format!("outer `{field}` sequence of record {index}"), 1, rows.len()));
    }
    Ok(rows.swap_remove(0))
}

/// Rejects a source whose shapes disagree with the sources merged before it.
fn check_against(source: ParsedSource, input_size: Option<usize>, num_targets: Option<usize>) -> Result<ParsedSource> {
    if let (Some(expected), Some(actual)) = (input_size, source.input_size) {
        if expected != actual {
            return Err(NnError::shape("input length", expected, actual));
        }
    }
    if let (Some(expected), Some(actual)) = (num_targets, source.num_targets) {
        if expected != actual {
            return Err(NnError::shape("one-hot target length", expected, actual));
        }
    }
    Ok(source)
}

fn log_summary(report: &LoadReport) {
    tracing::info!(
        "Total examples loaded: {} from {} source(s), {} skipped",
        report.total_examples,
        report.sources.len(),
        report.failures.len()
    );
    for (class, count) in &report.class_counts {
        tracing::info!("  class {}: {} examples", class, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    fn record(input: &[f64], label: usize, classes: usize) -> String {
        let mut target = vec![0.0; classes];
        target[label] = 1.0;
        serde_json::json!({ "input": [input], "target": [target] }).to_string()
    }

    #[test]
    fn merges_sources_in_lexical_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.json", &format!("[{}]", record(&[0.0, 1.0], 1, 3)));
        write(dir.path(), "a.json", &format!("[{},{}]", record(&[1.0, 0.0], 0, 3), record(&[1.0, 1.0], 2, 3)));
        write(dir.path(), "notes.txt", "ignored");

        let loaded = load_dir(dir.path()).unwrap();
        let labels: Vec<usize> = loaded.dataset.examples().iter().map(|e| e.label).collect();
        assert_eq!(labels, vec![0, 2, 1]);
        assert_eq!(loaded.dataset.input_size(), 2);
        assert_eq!(loaded.dataset.num_targets(), 3);
        assert_eq!(loaded.report.sources.len(), 2);
        assert!(loaded.report.failures.is_empty());
        assert_eq!(loaded.report.class_counts.get(&2), Some(&1));
    }

    #[test]
    fn skips_file_with_bad_label_encoding() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.json", &format!("[{}]", record(&[1.0], 0, 2)));
        write(dir.path(), "two_hot.json", r#"[{"input": [[1.0]], "target": [[1, 1]]}]"#);

        let loaded = load_dir(dir.path()).unwrap();
        assert_eq!(loaded.dataset.len(), 1);
        assert_eq!(loaded.report.failures.len(), 1);
        assert!(loaded.report.failures[0].reason.contains("entries equal to 1"));
    }

    #[test]
    fn skips_source_whose_input_length_disagrees() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", &format!("[{}]", record(&[1.0, 0.0], 0, 2)));
        write(dir.path(), "b.json", &format!("[{}]", record(&[1.0, 0.0, 1.0], 1, 2)));

        let loaded = load_dir(dir.path()).unwrap();
        assert_eq!(loaded.dataset.len(), 1);
        assert!(loaded.report.failures[0].reason.contains("expected 2, got 3"));
    }

    #[test]
    fn all_sources_bad_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "x.json", "{not json");
        write(dir.path(), "y.json", "[]");
        match load_dir(dir.path()) {
            Err(NnError::NoData { failures }) => assert_eq!(failures.len(), 1),
            other => panic!("expected NoData, got {other:?}"),
        }
    }

    #[test]
    fn unreadable_entry_is_reported_and_the_walk_continues() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(dir.path(), "a.json", &format!("[{},{}]", record(&[1.0], 0, 2), record(&[0.0], 1, 2)));
        let notes = write(dir.path(), "notes.txt", "ignored");
        let entries = vec![
            Ok(good.clone()),
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "entry vanished")),
            Ok(notes),
        ];

        let (paths, failures) = json_sources(dir.path(), entries);
        assert_eq!(paths, vec![good]);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].reason.contains("entry vanished"));

        let loaded = merge_sources(&paths, failures).unwrap();
        assert_eq!(loaded.dataset.len(), 2);
        assert_eq!(loaded.report.sources.len(), 1);
        assert_eq!(loaded.report.failures.len(), 1);
    }

    #[test]
    fn missing_folder_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(load_dir(&missing), Err(NnError::NoData { .. })));
    }
}
