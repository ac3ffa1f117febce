//! Export driver runs against a shell-script stand-in for the export
//! application.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use panelsync_core::config::ExportConfig;
use panelsync_core::types::ArtifactFormat;
use panelsync_export::{ExportDriver, ExportError, ExportRequest, ScriptParams};
use serial_test::serial;

const PRELUDE: &str = r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    --ScriptParam=*) params="${arg#--ScriptParam=}" ;;
    --ScriptOutput=*) console="${arg#--ScriptOutput=}" ;;
  esac
done
out=$(printf '%s' "$params" | sed -n "s/.*out='\([^']*\)'.*/\1/p")
echo "exporting to $out" > "$console"
"#;

struct Fixture {
    _dir: tempfile::TempDir,
    request: ExportRequest,
}

fn fixture(body: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let app = dir.path().join("fake3dr.sh");
    std::fs::write(&app, format!("{PRELUDE}{body}\n")).unwrap();
    std::fs::set_permissions(&app, std::fs::Permissions::from_mode(0o755)).unwrap();

    let script = dir.path().join("export.js");
    let source = dir.path().join("site.3dr");
    std::fs::write(&script, b"// export").unwrap();
    std::fs::write(&source, b"3dr").unwrap();

    let request = ExportRequest {
        app,
        script,
        source,
        output: dir.path().join("out").join("site.obj"),
        format: ArtifactFormat::Obj,
        params: ScriptParams::new().raw("exportAll", "1"),
    };
    Fixture { _dir: dir, request }
}

fn fast_config() -> ExportConfig {
    ExportConfig {
        timeout_seconds: 10,
        poll_interval_ms: 50,
        probe_dwell_ms: 1000,
        probe_poll_ms: 50,
        probe_timeout_ms: 3000,
        final_dwell_ms: 300,
        final_poll_ms: 50,
        final_timeout_ms: 5000,
        revalidate_delay_ms: 100,
        ..Default::default()
    }
}

fn output(request: &ExportRequest) -> PathBuf {
    request.output.clone()
}

#[tokio::test]
#[serial]
async fn test_waits_for_final_chunk_while_process_lingers() {
    let fx = fixture(
        r#"printf '# mesh\nv 0 0 0\n' >> "$out"
sleep 0.4
printf 'v 1 0 0\nv 0 1 0\n' >> "$out"
sleep 0.4
printf 'f 1 2 3\n' >> "$out"
sleep 2"#,
    );
    let driver = ExportDriver::new(fast_config());

    let started = Instant::now();
    let bytes = driver.run_export(&fx.request).await.unwrap();

    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        "# mesh\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n"
    );
    assert!(started.elapsed() >= Duration::from_millis(1700));
    let snap = driver.metrics_snapshot();
    assert_eq!(snap.exports_succeeded, 1);
    assert_eq!(snap.early_completions, 1);
}

#[tokio::test]
#[serial]
async fn test_output_after_exit_is_returned() {
    let fx = fixture(r#"printf '# mesh\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n' > "$out""#);
    let driver = ExportDriver::new(fast_config());

    let bytes = driver.run_export(&fx.request).await.unwrap();
    assert!(bytes.ends_with(b"f 1 2 3\n"));
    assert!(output(&fx.request).is_file());
}

#[tokio::test]
#[serial]
async fn test_no_output_is_an_error() {
    let fx = fixture("exit 0");
    let driver = ExportDriver::new(fast_config());

    let err = driver.run_export(&fx.request).await.unwrap_err();
    assert!(matches!(err, ExportError::NoOutput { .. }), "{err}");
    assert_eq!(driver.metrics_snapshot().exports_failed, 1);
}

#[tokio::test]
#[serial]
async fn test_stale_output_is_not_mistaken_for_a_new_export() {
    let fx = fixture("exit 0");
    let out = output(&fx.request);
    std::fs::create_dir_all(out.parent().unwrap()).unwrap();
    std::fs::write(&out, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
    let driver = ExportDriver::new(fast_config());

    let err = driver.run_export(&fx.request).await.unwrap_err();
    assert!(matches!(err, ExportError::NoOutput { .. }), "{err}");
    assert!(!out.exists());
}

#[tokio::test]
#[serial]
async fn test_timeout_kills_process_tree() {
    let fx = fixture("sleep 30");
    let config = ExportConfig {
        timeout_seconds: 1,
        ..fast_config()
    };
    let driver = ExportDriver::new(config);

    let started = Instant::now();
    let err = driver.run_export(&fx.request).await.unwrap_err();

    assert!(matches!(err, ExportError::Timeout { timeout_seconds: 1 }), "{err}");
    assert!(started.elapsed() < Duration::from_secs(10));
    let snap = driver.metrics_snapshot();
    assert_eq!(snap.exports_timed_out, 1);
    assert_eq!(snap.exports_failed, 1);
}

#[tokio::test]
#[serial]
async fn test_growing_output_does_not_outlast_timeout() {
    let fx = fixture(
        r#"while :; do
  printf 'v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n' >> "$out"
  sleep 0.05
done"#,
    );
    let config = ExportConfig {
        timeout_seconds: 1,
        probe_timeout_ms: 6000,
        ..fast_config()
    };
    let driver = ExportDriver::new(config);

    let started = Instant::now();
    let bytes = driver.run_export(&fx.request).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(4), "timeout 1s overran to {elapsed:?}");
    assert!(bytes.starts_with(b"v 0 0 0\n"));
    let snap = driver.metrics_snapshot();
    assert_eq!(snap.early_completions, 0);
    assert_eq!(snap.exports_succeeded, 1);
}

#[tokio::test]
#[serial]
async fn test_soft_validation_failure_after_retry() {
    let fx = fixture(r#"printf 'this is not a mesh, only some words here\n' > "$out""#);
    let driver = ExportDriver::new(fast_config());

    let err = driver.run_export(&fx.request).await.unwrap_err();
    match err {
        ExportError::SoftValidation { reason, .. } => assert_eq!(reason, "no vertex records"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(driver.metrics_snapshot().soft_validation_retries, 1);
}

#[tokio::test]
#[serial]
async fn test_script_receives_normalized_params() {
    let fx = fixture(
        r#"printf '%s\n' "$params" > "$(dirname "$out")/params.txt"
printf 'v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n# padding\n' > "$out""#,
    );
    let driver = ExportDriver::new(fast_config());
    driver.run_export(&fx.request).await.unwrap();

    let params_file = fx.request.output.with_file_name("params.txt");
    let params = std::fs::read_to_string(params_file).unwrap();
    assert!(params.contains("project='"));
    assert!(params.contains("site.3dr'"));
    assert!(params.trim_end().ends_with("exportAll=1;"));
}
