//! Tests for error types

use miette::Diagnostic;
use pipeprobe_core::{BranchName, Error, TargetRef};
use std::path::PathBuf;

fn code(err: &Error) -> String {
    err.code().map(|c| c.to_string()).unwrap_or_default()
}

#[test]
fn test_lifecycle_errors_have_distinct_codes() {
    let cause = || Box::new(Error::git("x", "boom"));
    let errors = [
        Error::Clone {
            target: "a/b".into(),
            source: cause(),
        },
        Error::Branch {
            branch: "lint-testing-abcde".into(),
            source: cause(),
        },
        Error::Injection {
            path: PathBuf::from("p.yml"),
            message: "missing".into(),
            source: None,
        },
        Error::commit("no commits"),
        Error::Push {
            branch: "lint-testing-abcde".into(),
            source: cause(),
        },
        Error::Trigger {
            target: "a/b".into(),
            branch: "lint-testing-abcde".into(),
            source: cause(),
        },
        Error::PollTimeout {
            run_id: "1".into(),
            waited_secs: 60,
        },
        Error::LogCollection {
            run_id: "1".into(),
            source: cause(),
        },
    ];
    let mut codes: Vec<String> = errors.iter().map(code).collect();
    assert!(codes.iter().all(|c| c.starts_with("pipeprobe::lifecycle::")));
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), errors.len());
}

#[test]
fn test_trigger_error_wraps_api_error() {
    let err = Error::Trigger {
        target: "acme/widgets".into(),
        branch: "lint-testing-abcde".into(),
        source: Box::new(Error::api("github", Some(403), "Resource not accessible")),
    };
    assert_eq!(
        err.to_string(),
        "Failed to trigger a run for acme/widgets on lint-testing-abcde"
    );
    let source = std::error::Error::source(&err).unwrap();
    assert_eq!(source.to_string(), "github API error: Resource not accessible");
}

#[test]
fn test_deadline_is_timeout() {
    let err = Error::DeadlineExceeded {
        stage: "push".into(),
        seconds: 30,
    };
    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "Deadline of 30s exceeded during push");
}

#[test]
fn test_invalid_target_has_help() {
    let err = TargetRef::parse("just-a-name").unwrap_err();
    assert!(matches!(err, Error::InvalidTarget { .. }));
    assert!(err.help().is_some());
}

#[test]
fn test_invalid_branch_is_configuration_error() {
    let err = BranchName::new("has space").unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
    assert_eq!(code(&err), "pipeprobe::config");
}

#[test]
fn test_io_error_keeps_path() {
    let err = Error::io(
        "read pipeline file",
        Some(PathBuf::from("/tmp/ci.yml")),
        std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
    );
    assert_eq!(err.to_string(), "I/O read pipeline file failed");
    match err {
        Error::Io { path: Some(p), .. } => assert_eq!(p, PathBuf::from("/tmp/ci.yml")),
        _ => panic!("Expected Io error with path"),
    }
}
