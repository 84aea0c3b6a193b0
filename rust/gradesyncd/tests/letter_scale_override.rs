use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradesyncd");
    let mut child = Command::new(exe)
        .env_remove("GRADESYNC_WORKSPACE")
        .env_remove("GRADESYNC_MAX_ACHIEVABLE")
        .env_remove("GRADESYNC_DEFAULT_TARGET")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradesyncd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn letter_of(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    course_id: &str,
) -> String {
    let summary = request_ok(
        stdin,
        reader,
        id,
        "calc.courseSummary",
        json!({ "courseId": course_id }),
    );
    summary
        .get("letterGrade")
        .and_then(|v| v.as_str())
        .expect("letterGrade")
        .to_string()
}

#[test]
fn letter_scale_override_applies_and_clears() {
    let workspace = temp_dir("gradesync-letter-scale");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let initial = request_ok(&mut stdin, &mut reader, "2", "calc.letterScale.get", json!({}));
    assert_eq!(initial.get("source").and_then(|v| v.as_str()), Some("default"));
    assert_eq!(
        initial
            .pointer("/scale/bands")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(11)
    );
    assert_eq!(
        initial.pointer("/scale/floorLetter").and_then(|v| v.as_str()),
        Some("F")
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "courses.create",
        json!({ "code": "CHEM101", "name": "Chemistry" }),
    );
    let course_id = created
        .get("courseId")
        .and_then(|v| v.as_str())
        .expect("courseId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "weights.create",
        json!({ "courseId": course_id, "category": "Quizzes", "weight": 100 }),
    );
    let quiz = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "assignments.create",
        json!({ "courseId": course_id, "name": "Quiz 1", "category": "Quizzes", "maxPoints": 100 }),
    );
    let quiz_id = quiz
        .get("assignmentId")
        .and_then(|v| v.as_str())
        .expect("assignmentId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "grades.upsert",
        json!({ "assignmentId": quiz_id, "pointsEarned": 65 }),
    );
    assert_eq!(letter_of(&mut stdin, &mut reader, "7", &course_id), "D");

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "calc.letterScale.update",
        json!({
            "scale": {
                "bands": [
                    { "minPercent": 90, "letter": "A" },
                    { "minPercent": 80, "letter": "B" },
                    { "minPercent": 70, "letter": "C" }
                ],
                "floorLetter": "NP"
            }
        }),
    );
    assert_eq!(updated.get("source").and_then(|v| v.as_str()), Some("override"));
    assert_eq!(letter_of(&mut stdin, &mut reader, "9", &course_id), "NP");

    let stored = request_ok(&mut stdin, &mut reader, "10", "calc.letterScale.get", json!({}));
    assert_eq!(stored.get("source").and_then(|v| v.as_str()), Some("override"));
    assert_eq!(
        stored
            .pointer("/scale/bands")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(3)
    );

    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "calc.letterScale.clearOverride",
        json!({}),
    );
    assert_eq!(cleared.get("cleared").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(letter_of(&mut stdin, &mut reader, "12", &course_id), "D");

    let again = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "calc.letterScale.clearOverride",
        json!({}),
    );
    assert_eq!(again.get("cleared").and_then(|v| v.as_bool()), Some(false));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn invalid_letter_scales_are_rejected_and_not_stored() {
    let workspace = temp_dir("gradesync-letter-scale-invalid");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let ascending = request(
        &mut stdin,
        &mut reader,
        "2",
        "calc.letterScale.update",
        json!({
            "scale": {
                "bands": [
                    { "minPercent": 70, "letter": "C" },
                    { "minPercent": 90, "letter": "A" }
                ],
                "floorLetter": "F"
            }
        }),
    );
    assert_eq!(
        ascending.pointer("/error/code").and_then(|v| v.as_str()),
        Some("validation_failed")
    );
    assert_eq!(
        ascending.pointer("/error/details/field").and_then(|v| v.as_str()),
        Some("bands")
    );

    let empty = request(
        &mut stdin,
        &mut reader,
        "3",
        "calc.letterScale.update",
        json!({ "scale": { "bands": [], "floorLetter": "F" } }),
    );
    assert_eq!(
        empty.pointer("/error/code").and_then(|v| v.as_str()),
        Some("validation_failed")
    );

    let malformed = request(
        &mut stdin,
        &mut reader,
        "4",
        "calc.letterScale.update",
        json!({ "scale": { "bands": "A-F" } }),
    );
    assert_eq!(
        malformed.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );

    let current = request_ok(&mut stdin, &mut reader, "5", "calc.letterScale.get", json!({}));
    assert_eq!(current.get("source").and_then(|v| v.as_str()), Some("default"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn letter_scale_floor_letter_is_stored_trimmed() {
    let workspace = temp_dir("gradesync-letter-scale-trim");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "calc.letterScale.update",
        json!({
            "scale": {
                "bands": [{ "minPercent": 50.0, "letter": "P" }],
                "floorLetter": "  NP "
            }
        }),
    );
    assert_eq!(
        saved.pointer("/scale/floorLetter").and_then(|v| v.as_str()),
        Some("NP")
    );

    let current = request_ok(&mut stdin, &mut reader, "3", "calc.letterScale.get", json!({}));
    assert_eq!(current.get("source").and_then(|v| v.as_str()), Some("override"));
    assert_eq!(
        current.pointer("/scale/floorLetter").and_then(|v| v.as_str()),
        Some("NP")
    );

    let blank = request(
        &mut stdin,
        &mut reader,
        "4",
        "calc.letterScale.update",
        json!({
            "scale": {
                "bands": [{ "minPercent": 50.0, "letter": "P" }],
                "floorLetter": "   "
            }
        }),
    );
    assert_eq!(
        blank.pointer("/error/details/field").and_then(|v| v.as_str()),
        Some("floorLetter")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
