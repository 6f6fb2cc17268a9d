use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
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
    let exe = env!("CARGO_BIN_EXE_classdeskd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn classdeskd");
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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn setup_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &Path,
) -> i64 {
    let _ = request(
        stdin,
        reader,
        "setup-ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let registered = request(
        stdin,
        reader,
        "setup-student",
        "auth.register",
        json!({
            "firstName": "Joan",
            "lastName": "Clarke",
            "email": "joan@school.edu",
            "mobile": "+61412000333",
            "password": "hutt-eight",
            "role": "student",
            "className": "9A"
        }),
    );
    registered
        .get("result")
        .and_then(|v| v.get("user"))
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_i64())
        .expect("student id")
}

fn set_flag(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    student_id: i64,
    flag: &str,
    value: bool,
) -> serde_json::Value {
    let resp = request(
        stdin,
        reader,
        id,
        "attendance.setFlag",
        json!({
            "studentId": student_id,
            "day": "2030-03-04",
            "flag": flag,
            "value": value
        }),
    );
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "setFlag {} failed: {}",
        flag,
        resp
    );
    resp["result"]["record"].clone()
}

fn flags_of(record: &serde_json::Value) -> (bool, bool, bool, bool) {
    (
        record["present"].as_bool().expect("present"),
        record["absent"].as_bool().expect("absent"),
        record["late"].as_bool().expect("late"),
        record["excused"].as_bool().expect("excused"),
    )
}

#[test]
fn exclusive_flags_displace_each_other() {
    let workspace = temp_dir("classdesk-attendance-exclusive");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let student_id = setup_student(&mut stdin, &mut reader, &workspace);

    let record = set_flag(&mut stdin, &mut reader, "1", student_id, "excused", true);
    assert_eq!(flags_of(&record), (false, false, false, true));

    // Present displaces excused (and absent).
    let record = set_flag(&mut stdin, &mut reader, "2", student_id, "present", true);
    assert_eq!(flags_of(&record), (true, false, false, false));

    let record = set_flag(&mut stdin, &mut reader, "3", student_id, "absent", true);
    assert_eq!(flags_of(&record), (false, true, false, false));

    let record = set_flag(&mut stdin, &mut reader, "4", student_id, "excused", true);
    assert_eq!(flags_of(&record), (false, false, false, true));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn late_combines_with_exclusive_flags() {
    let workspace = temp_dir("classdesk-attendance-late");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let student_id = setup_student(&mut stdin, &mut reader, &workspace);

    let record = set_flag(&mut stdin, &mut reader, "1", student_id, "present", true);
    assert_eq!(flags_of(&record), (true, false, false, false));

    let record = set_flag(&mut stdin, &mut reader, "2", student_id, "late", true);
    assert_eq!(flags_of(&record), (true, false, true, false));

    // Swapping the exclusive flag leaves late untouched.
    let record = set_flag(&mut stdin, &mut reader, "3", student_id, "absent", true);
    assert_eq!(flags_of(&record), (false, true, true, false));

    let record = set_flag(&mut stdin, &mut reader, "4", student_id, "late", false);
    assert_eq!(flags_of(&record), (false, true, false, false));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn notes_survive_flag_changes() {
    let workspace = temp_dir("classdesk-attendance-notes");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let student_id = setup_student(&mut stdin, &mut reader, &workspace);

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.setNote",
        json!({
            "studentId": student_id,
            "day": "2030-03-04",
            "note": "left early for appointment"
        }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(true));

    let record = set_flag(&mut stdin, &mut reader, "2", student_id, "present", true);
    assert_eq!(
        record["notes"].as_str(),
        Some("left early for appointment")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn day_open_lists_roster_with_default_flags() {
    let workspace = temp_dir("classdesk-attendance-dayopen");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let student_id = setup_student(&mut stdin, &mut reader, &workspace);

    // A teacher should not appear in the roster.
    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "auth.register",
        json!({
            "firstName": "Kathleen",
            "lastName": "Booth",
            "email": "kathleen@school.edu",
            "mobile": "+61412000444",
            "password": "arc-assembly",
            "role": "teacher"
        }),
    );

    let opened = request(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.dayOpen",
        json!({ "day": "2030-03-04" }),
    );
    let students = opened["result"]["students"]
        .as_array()
        .expect("students array");
    assert_eq!(students.len(), 1);
    assert_eq!(
        students[0]["displayName"].as_str(),
        Some("Clarke, Joan")
    );

    let rows = opened["result"]["rows"].as_array().expect("rows array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["studentId"].as_i64(), Some(student_id));
    assert_eq!(flags_of(&rows[0]), (false, false, false, false));

    let bad_day = request(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.dayOpen",
        json!({ "day": "not-a-day" }),
    );
    assert_eq!(
        bad_day
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("invalid_date")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
