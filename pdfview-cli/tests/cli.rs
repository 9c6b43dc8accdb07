use assert_cmd::Command;

#[test]
fn missing_file_argument_is_rejected() {
    let assert = Command::cargo_bin("pdfview").unwrap().assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("<FILE>"), "unexpected stderr: {stderr}");
}

#[test]
fn help_lists_batch_flags() {
    let assert = Command::cargo_bin("pdfview")
        .unwrap()
        .arg("--help")
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    for flag in ["--page", "--password", "--metadata", "--list-attachments", "--extract-attachment"] {
        assert!(stdout.contains(flag), "help is missing {flag}");
    }
}

#[test]
fn output_requires_an_attachment_name() {
    Command::cargo_bin("pdfview")
        .unwrap()
        .args(["doc.pdf", "--output", "out.bin"])
        .assert()
        .failure();
}

#[test]
fn metadata_conflicts_with_extraction() {
    Command::cargo_bin("pdfview")
        .unwrap()
        .args([
            "doc.pdf",
            "--metadata",
            "--extract-attachment",
            "a.txt",
            "--output",
            "a.txt",
        ])
        .assert()
        .failure();
}
