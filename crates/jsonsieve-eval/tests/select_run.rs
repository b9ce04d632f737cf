mod helpers;

use helpers::{Workspace, select_rules};
use jsonsieve_eval::{
    ArrayMatch, EvalError, InvalidRecordPolicy, RunConfig, SelectConfig, SelectRun,
};

const ADMINS: &str = r#"[{"position":1,"output":"admins","conditions":[{"type":"match","key":"role","values":["admin"],"exclude":false}]}]"#;

fn config(ws: &Workspace) -> SelectConfig {
    SelectConfig::new(RunConfig::new(ws.input(), ws.output()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn select_routes_admins_and_default() {
    let ws = Workspace::new(&[("events.json", "{\"role\":\"admin\",\"name\":\"x\"}\n{\"role\":\"user\"}\n")]);

    let report = SelectRun::new(config(&ws), &select_rules(ADMINS))
        .unwrap()
        .execute()
        .await
        .unwrap();

    assert_eq!(report.units, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(ws.read_output("admins"), "{\"role\":\"admin\",\"name\":\"x\"}\n");
    assert_eq!(ws.read_output("default"), "{\"role\":\"user\"}\n");
    assert_eq!(ws.read_output("drop"), "");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn select_lines_are_written_verbatim() {
    // Whitespace and key order survive routing.
    let line = "{ \"z\": 1,   \"role\": \"admin\" }";
    let body = format!("{line}\n");
    let ws = Workspace::new(&[("a.json", body.as_str())]);

    SelectRun::new(config(&ws), &select_rules(ADMINS))
        .unwrap()
        .execute()
        .await
        .unwrap();

    assert_eq!(ws.read_output("admins"), format!("{line}\n"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn select_lower_position_wins() {
    let rules = select_rules(
        r#"[
            {"position": 2, "output": "broad", "conditions": [
                {"type": "prefix", "key": "host", "values": ["web"], "exclude": false}
            ]},
            {"position": 1, "output": "narrow", "conditions": [
                {"type": "match", "key": "host", "values": ["web-01"], "exclude": false}
            ]}
        ]"#,
    );
    let ws = Workspace::new(&[(
        "hosts.json",
        "{\"host\":\"web-01\"}\n{\"host\":\"web-02\"}\n{\"host\":\"db-01\"}\n",
    )]);

    SelectRun::new(config(&ws), &rules).unwrap().execute().await.unwrap();

    assert_eq!(ws.output_lines("narrow"), vec!["{\"host\":\"web-01\"}"]);
    assert_eq!(ws.output_lines("broad"), vec!["{\"host\":\"web-02\"}"]);
    assert_eq!(ws.output_lines("default"), vec!["{\"host\":\"db-01\"}"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn select_every_record_lands_exactly_once() {
    let mut files = Vec::new();
    for f in 0..5 {
        let mut body = String::new();
        for i in 0..40 {
            let role = if i % 3 == 0 { "admin" } else { "user" };
            body.push_str(&format!("{{\"file\":{f},\"i\":{i},\"role\":\"{role}\"}}\n"));
        }
        files.push((format!("d{}/part-{f}.json", f % 2), body));
    }
    let refs: Vec<(&str, &str)> = files.iter().map(|(n, b)| (n.as_str(), b.as_str())).collect();
    let ws = Workspace::new(&refs);

    let report = SelectRun::new(config(&ws), &select_rules(ADMINS))
        .unwrap()
        .execute()
        .await
        .unwrap();

    let admins = ws.output_lines("admins");
    let default = ws.output_lines("default");
    assert_eq!(report.units, 200);
    assert_eq!(admins.len() + default.len(), 200);
    assert_eq!(admins.len(), 5 * 14);

    let mut all: Vec<String> = admins.into_iter().chain(default).collect();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn select_single_slot_matches_parallel_result() {
    let body = "{\"role\":\"admin\",\"n\":1}\n{\"role\":\"user\",\"n\":2}\n{\"role\":\"admin\",\"n\":3}\n";
    let serial = Workspace::new(&[("a.json", body)]);
    let parallel = Workspace::new(&[("a.json", body)]);

    let mut cfg = config(&serial);
    cfg.run = cfg.run.with_concurrency(1);
    SelectRun::new(cfg, &select_rules(ADMINS)).unwrap().execute().await.unwrap();
    SelectRun::new(config(&parallel), &select_rules(ADMINS))
        .unwrap()
        .execute()
        .await
        .unwrap();

    assert_eq!(serial.output_lines("admins"), parallel.output_lines("admins"));
    assert_eq!(serial.output_lines("default"), parallel.output_lines("default"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn select_empty_lines_are_skipped() {
    let ws = Workspace::new(&[("a.json", "\n{\"role\":\"user\"}\n\n\n")]);
    let report = SelectRun::new(config(&ws), &select_rules(ADMINS))
        .unwrap()
        .execute()
        .await
        .unwrap();
    assert_eq!(report.units, 1);
    assert_eq!(ws.read_output("default"), "{\"role\":\"user\"}\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn select_invalid_record_aborts_by_default() {
    let ws = Workspace::new(&[("a.json", "{\"role\":\"user\"}\nnot json\n")]);
    let err = SelectRun::new(config(&ws), &select_rules(ADMINS))
        .unwrap()
        .execute()
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::InvalidRecord { line: Some(2), .. }), "{err}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn select_invalid_record_skipped_when_configured() {
    let ws = Workspace::new(&[("a.json", "{\"role\":\"admin\"}\nnot json\n{\"role\":\"user\"}\n")]);
    let mut cfg = config(&ws);
    cfg.run = cfg.run.with_invalid_records(InvalidRecordPolicy::Skip);

    let report = SelectRun::new(cfg, &select_rules(ADMINS))
        .unwrap()
        .execute()
        .await
        .unwrap();

    assert_eq!(report.units, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(ws.output_lines("admins").len(), 1);
    assert_eq!(ws.output_lines("default").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn select_array_match_modes() {
    let rules = select_rules(
        r#"[{"position":1,"output":"tagged","conditions":[
            {"type":"match","key":"tags","values":["b"],"exclude":false}
        ]}]"#,
    );
    let body = "{\"tags\":[\"a\",\"b\"]}\n";

    let any = Workspace::new(&[("a.json", body)]);
    SelectRun::new(config(&any), &rules).unwrap().execute().await.unwrap();
    assert_eq!(any.output_lines("tagged").len(), 1);

    let first = Workspace::new(&[("a.json", body)]);
    let mut cfg = config(&first);
    cfg.array_match = ArrayMatch::First;
    SelectRun::new(cfg, &rules).unwrap().execute().await.unwrap();
    assert!(first.output_lines("tagged").is_empty());
    assert_eq!(first.output_lines("default").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn select_single_input_file() {
    let ws = Workspace::new(&[("a.json", "{\"role\":\"admin\"}\n")]);
    let cfg = SelectConfig::new(RunConfig::new(ws.input().join("a.json"), ws.output()));
    let report = SelectRun::new(cfg, &select_rules(ADMINS))
        .unwrap()
        .execute()
        .await
        .unwrap();
    assert_eq!(report.units, 1);
    assert_eq!(ws.output_lines("admins").len(), 1);
}

#[test]
fn select_zero_concurrency_rejected_before_output() {
    let ws = Workspace::new(&[("a.json", "{}\n")]);
    let mut cfg = config(&ws);
    cfg.run = cfg.run.with_concurrency(0);
    let err = SelectRun::new(cfg, &select_rules(ADMINS)).err().unwrap();
    assert!(matches!(err, EvalError::InvalidConfig(_)));
    assert!(!ws.output().exists());
}

#[test]
fn select_fallback_must_be_plain_file_name() {
    let ws = Workspace::new(&[("a.json", "{}\n")]);
    for bad in ["", "../escape", "sub/dir", ".."] {
        let mut cfg = config(&ws);
        cfg.fallback_label = bad.to_string();
        let err = SelectRun::new(cfg, &select_rules(ADMINS)).err().unwrap();
        assert!(
            matches!(err, EvalError::InvalidConfig(ref msg) if msg.contains("plain file name")),
            "{bad:?}: {err}"
        );
    }
    assert!(!ws.output().exists());
    assert!(!ws.dir.path().join("escape").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn select_bad_utf8_line_skipped_when_configured() {
    let ws = Workspace::new(&[]);
    std::fs::write(
        ws.input().join("a.json"),
        b"{\"role\":\"admin\"}\n{\"role\":\"\xff\"}\n{\"role\":\"user\"}\r\n",
    )
    .unwrap();
    let mut cfg = config(&ws);
    cfg.run = cfg.run.with_invalid_records(InvalidRecordPolicy::Skip);

    let report = SelectRun::new(cfg, &select_rules(ADMINS))
        .unwrap()
        .execute()
        .await
        .unwrap();

    assert_eq!(report.units, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(ws.output_lines("admins"), vec!["{\"role\":\"admin\"}"]);
    assert_eq!(ws.output_lines("default"), vec!["{\"role\":\"user\"}"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn select_bad_utf8_line_aborts_by_default() {
    let ws = Workspace::new(&[]);
    std::fs::write(ws.input().join("a.json"), b"{\"role\":\"\xff\"}\n").unwrap();

    let err = SelectRun::new(config(&ws), &select_rules(ADMINS))
        .unwrap()
        .execute()
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::InvalidRecord { line: Some(1), .. }), "{err}");
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn select_record_error_wins_over_flush_error() {
    if !std::path::Path::new("/dev/full").exists() {
        return;
    }
    // `default` points at a device that accepts opens but fails every write,
    // so the buffered record only fails once the run flushes.
    let ws = Workspace::new(&[("a.json", "{\"role\":\"user\"}\nnot json\n")]);
    std::fs::create_dir(ws.output()).unwrap();
    std::os::unix::fs::symlink("/dev/full", ws.output().join("default")).unwrap();

    let mut cfg = config(&ws);
    cfg.run = cfg.run.with_concurrency(1);
    let err = SelectRun::new(cfg, &select_rules(ADMINS))
        .unwrap()
        .execute()
        .await
        .unwrap_err();

    assert!(matches!(err, EvalError::InvalidRecord { line: Some(2), .. }), "{err}");
}
