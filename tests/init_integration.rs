//! Integration tests for the child-side initialization function

mod common;

use std::io::{BufRead, Read};

use ricecoder_subprocess::ProcessConfig;

use common::tool;

#[test]
fn test_init_sets_environment() {
    let input = rand::random::<u64>().to_string();
    let value = input.clone();

    let mut child = ProcessConfig::new(tool("sh"))
        .args(["-c", "echo $TESTSTRING"])
        .stdout()
        .init(move || {
            std::env::set_var("TESTSTRING", &value);
            Ok(())
        })
        .spawn()
        .unwrap();

    let output = child
        .stdout(|is| {
            let mut line = String::new();
            is.read_line(&mut line).map(|_| line)
        })
        .unwrap()
        .get()
        .unwrap();
    assert_eq!(child.join(), 0);
    assert_eq!(output.trim_end(), input);
}

#[test]
fn test_init_error_reaches_stderr() {
    let input = rand::random::<u64>().to_string();
    let message = input.clone();

    let mut child = ProcessConfig::new(tool("sh"))
        .args(["-c", "echo If you can see this, the test has failed >&2"])
        .stderr()
        .init(move || anyhow::bail!("init failed with {message}"))
        .spawn()
        .unwrap();

    let output = child
        .stderr(|is| {
            let mut text = String::new();
            is.read_to_string(&mut text).map(|_| text)
        })
        .unwrap()
        .get()
        .unwrap();
    let status = child.join_status().unwrap();

    assert_eq!(status.code(), Some(1));
    assert!(output.contains(&input), "stderr was {output:?}");
    assert!(!output.contains("the test has failed"));
}

#[test]
fn test_init_panic_reaches_stderr() {
    let input = rand::random::<u64>().to_string();
    let message = input.clone();

    let mut child = ProcessConfig::new(tool("true"))
        .stderr()
        .init(move || panic!("{message}"))
        .spawn()
        .unwrap();

    let output = child
        .stderr(|is| {
            let mut text = String::new();
            is.read_to_string(&mut text).map(|_| text)
        })
        .unwrap()
        .get()
        .unwrap();

    assert_ne!(child.join(), 0);
    assert!(output.contains("initialization function"));
    assert!(output.contains(&input), "stderr was {output:?}");
}

#[test]
fn test_init_changes_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().canonicalize().unwrap();
    let cwd = path.clone();

    let mut child = ProcessConfig::new(tool("pwd"))
        .stdout()
        .init(move || Ok(std::env::set_current_dir(&cwd)?))
        .spawn()
        .unwrap();

    let output = child
        .stdout(|is| {
            let mut line = String::new();
            is.read_line(&mut line).map(|_| line)
        })
        .unwrap()
        .get()
        .unwrap();
    assert_eq!(child.join(), 0);
    assert_eq!(output.trim_end(), path.to_str().unwrap());
}
