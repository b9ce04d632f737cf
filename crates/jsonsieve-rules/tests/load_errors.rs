use std::path::Path;

use jsonsieve_rules::{RuleError, load_replace_rules, load_select_rules};

fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn missing_file_names_the_path() {
    let err = load_select_rules(Path::new("/nonexistent/select.json")).unwrap_err();
    assert!(
        matches!(err, RuleError::Io { ref path, .. } if path == Path::new("/nonexistent/select.json")),
        "expected Io error, got: {err}"
    );
    assert!(err.to_string().contains("/nonexistent/select.json"));
}

#[test]
fn json_object_instead_of_array() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "rules.json", r#"{"position": 1, "output": "x"}"#);
    let err = load_select_rules(&path).unwrap_err();
    assert!(matches!(err, RuleError::Json(_)), "expected Json error, got: {err}");
}

#[test]
fn yaml_extension_selects_yaml_parser() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "rules.yaml",
        "- order: 2\n  type: global\n  original: a\n  replacement: b\n\
         - order: 1\n  type: per-field\n  field-name: user.name\n  original: x\n  replacement: y\n",
    );
    let rules = load_replace_rules(&path).unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules.rules[0].order, 1);
    assert_eq!(rules.rules[0].field.as_str(), "user.name");
}

#[test]
fn malformed_yaml_is_yaml_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "rules.yml", "- position: [unterminated\n");
    let err = load_select_rules(&path).unwrap_err();
    assert!(matches!(err, RuleError::Yaml(_)), "expected Yaml error, got: {err}");
}

#[test]
fn unknown_extension_is_parsed_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "rules.txt",
        r#"[{"position": 0, "output": "all", "conditions": []}]"#,
    );
    let rules = load_select_rules(&path).unwrap();
    assert_eq!(rules.outputs(), vec!["all"]);
}

#[test]
fn unknown_replacement_type_in_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "rules.json", r#"[{"order": 1, "type": "rename", "field-name": "a"}]"#);
    let err = load_replace_rules(&path).unwrap_err();
    assert!(
        matches!(err, RuleError::UnknownType { what: "replacement", ref found } if found == "rename"),
        "expected UnknownType, got: {err}"
    );
}
