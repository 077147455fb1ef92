use jsv::{CompileOptions, Draft, Url, Value};
use serde::Deserialize;
use std::convert::TryFrom;
use std::fs;
use std::path::PathBuf;

#[derive(Deserialize)]
struct TestGroup {
    description: String,
    schema: serde_json::Value,
    tests: Vec<TestCase>,
}

#[derive(Deserialize)]
struct TestCase {
    description: String,
    data: serde_json::Value,
    valid: bool,
}

/// The official JSON Schema Test Suite, then cases it does not cover. Both
/// use the suite's layout: `tests/<draft>/*.json` and `remotes/`.
fn fixture_dirs() -> Vec<PathBuf> {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests");
    vec![root.join("suite"), root.join("extra")]
}

/// Serves `http://localhost:1234/...` from the `remotes` directories.
fn retrieve(uri: &Url) -> anyhow::Result<serde_json::Value> {
    let path = match (uri.host_str(), uri.port()) {
        (Some("localhost"), Some(1234)) => uri.path().trim_start_matches('/'),
        _ => anyhow::bail!("no remote document at {}", uri),
    };

    let file = fixture_dirs()
        .into_iter()
        .map(|dir| dir.join("remotes").join(path))
        .find(|file| file.is_file())
        .ok_or_else(|| anyhow::anyhow!("no remote document at {}", uri))?;
    let text = fs::read_to_string(file)?;
    Ok(serde_json::from_str(&text)?)
}

fn run(draft: Draft, dir: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let mut cases = 0;
    let patterns = fixture_dirs()
        .into_iter()
        .flat_map(|fixtures| vec![fixtures.join(dir), fixtures.join("tests").join(dir)])
        .map(|fixtures| fixtures.join("*.json"));
    let paths = patterns.flat_map(|pattern| {
        glob::glob(&pattern.to_string_lossy()).expect("valid glob pattern")
    });

    for entry in paths {
        let path = entry.expect("readable test file");
        let text = fs::read_to_string(&path).expect("read test file");
        let groups: Vec<TestGroup> = serde_json::from_str(&text)
            .unwrap_or_else(|err| panic!("parse {}: {}", path.display(), err));

        for group in groups {
            let group_name = format!("{}: {}", path.display(), group.description);
            let validator = CompileOptions::new()
                .with_draft(draft)
                .with_retriever(retrieve)
                .compile(&group.schema)
                .unwrap_or_else(|err| panic!("{}: {}", group_name, err));

            for case in group.tests {
                let case_name = format!("{}: {}", group_name, case.description);
                let instance = Value::try_from(&case.data).expect(&case_name);

                assert_eq!(case.valid, validator.is_valid(&instance), "{}", case_name);
                assert_eq!(
                    case.valid,
                    validator.validate(&instance).next().is_none(),
                    "errors disagree: {}",
                    case_name
                );
                cases += 1;
            }
        }
    }

    assert!(cases > 0, "no test cases found for {}", dir);
}

#[test]
fn draft4() {
    run(Draft::Draft4, "draft4");
}

#[test]
fn draft6() {
    run(Draft::Draft6, "draft6");
}

#[test]
fn draft7() {
    run(Draft::Draft7, "draft7");
}
