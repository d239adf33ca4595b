use assert_cmd::Command;

fn capvisor() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_capvisor"));
    cmd.env_remove("CAPVISOR_SERVER")
        .env_remove("CAPVISOR_TOKEN_FILE")
        .env_remove("CAPVISOR_PASSWORD");
    cmd
}

#[test]
fn help_lists_every_command() {
    let output = capvisor().arg("--help").output().expect("run help");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).expect("utf8 help");
    for command in [
        "health", "login", "logout", "catalog", "topics", "skeleton", "translate", "logs",
    ] {
        assert!(text.contains(command), "missing {command} in help:\n{text}");
    }
}

#[test]
fn logout_without_a_token_file_succeeds_offline() {
    let dir = tempfile::tempdir().expect("tempdir");
    let token = dir.path().join("token");
    std::fs::write(&token, "abc").expect("seed token");
    capvisor()
        .args(["--token-file"])
        .arg(&token)
        .arg("logout")
        .assert()
        .success();
    assert!(!token.exists());
}

#[test]
fn protected_command_without_login_fails_before_any_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = capvisor()
        .args(["--server", "http://127.0.0.1:9", "--token-file"])
        .arg(dir.path().join("token"))
        .arg("catalog")
        .output()
        .expect("run catalog");
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).expect("utf8 stderr");
    assert!(stderr.contains("not logged in"), "{stderr}");
}

#[test]
fn unknown_face_shape_is_a_usage_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = capvisor()
        .arg("--token-file")
        .arg(dir.path().join("token"))
        .args(["topics", "--face-shape", "triangle"])
        .output()
        .expect("run topics");
    assert_eq!(output.status.code(), Some(2));
}
