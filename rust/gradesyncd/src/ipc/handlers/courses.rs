use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, db_err, optional_f64, optional_i64, optional_str, require_course, required_str,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::assignments::list_assignments_json;
use super::weights::list_weights_json;

fn valid_target(req: &Request, v: f64) -> Result<f64, serde_json::Value> {
    if v.is_finite() && v >= 0.0 {
        Ok(v)
    } else {
        Err(err(
            &req.id,
            "validation_failed",
            format!("targetGrade: targetGrade must be a non-negative number (got {v})"),
            Some(json!({ "field": "targetGrade" })),
        ))
    }
}

fn course_row_json(conn: &Connection, course_id: &str) -> rusqlite::Result<Option<serde_json::Value>> {
    conn.query_row(
        "SELECT id, code, name, semester, year, target_grade, external_id, created_at, updated_at
         FROM courses
         WHERE id = ?",
        [course_id],
        |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "code": r.get::<_, String>(1)?,
                "name": r.get::<_, String>(2)?,
                "semester": r.get::<_, Option<String>>(3)?,
                "year": r.get::<_, Option<i64>>(4)?,
                "targetGrade": r.get::<_, f64>(5)?,
                "externalId": r.get::<_, Option<String>>(6)?,
                "createdAt": r.get::<_, String>(7)?,
                "updatedAt": r.get::<_, String>(8)?,
            }))
        },
    )
    .optional()
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "courses": [] }));
    };

    // Correlated subqueries keep the counts independent of each other.
    let mut stmt = match conn.prepare(
        "SELECT
           c.id,
           c.code,
           c.name,
           c.semester,
           c.year,
           c.target_grade,
           (SELECT COUNT(*) FROM syllabus_weights w WHERE w.course_id = c.id) AS weight_count,
           (SELECT COALESCE(SUM(w.weight), 0) FROM syllabus_weights w WHERE w.course_id = c.id) AS total_weight,
           (SELECT COUNT(*) FROM assignments a WHERE a.course_id = c.id) AS assignment_count,
           (SELECT COUNT(*) FROM grades g JOIN assignments a ON a.id = g.assignment_id
             WHERE a.course_id = c.id) AS graded_count
         FROM courses c
         ORDER BY c.code, c.name",
    ) {
        Ok(s) => s,
        Err(e) => return db_err(req, "db_query_failed", e, None),
    };
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "code": r.get::<_, String>(1)?,
                "name": r.get::<_, String>(2)?,
                "semester": r.get::<_, Option<String>>(3)?,
                "year": r.get::<_, Option<i64>>(4)?,
                "targetGrade": r.get::<_, f64>(5)?,
                "weightCount": r.get::<_, i64>(6)?,
                "totalWeight": r.get::<_, f64>(7)?,
                "assignmentCount": r.get::<_, i64>(8)?,
                "gradedCount": r.get::<_, i64>(9)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(courses) => ok(&req.id, json!({ "courses": courses })),
        Err(e) => db_err(req, "db_query_failed", e, None),
    }
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let code = match required_str(req, "code") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let semester = match optional_str(req, "semester") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year = match optional_i64(req, "year") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let external_id = match optional_str(req, "externalId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let target_grade = match optional_f64(req, "targetGrade") {
        Ok(Some(v)) => match valid_target(req, v) {
            Ok(v) => v,
            Err(e) => return e,
        },
        Ok(None) => state.config.default_target_grade,
        Err(e) => return e,
    };

    let course_id = Uuid::new_v4().to_string();
    let now = db::now_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO courses(id, code, name, semester, year, target_grade, external_id, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &course_id,
            &code,
            &name,
            &semester,
            year,
            target_grade,
            &external_id,
            &now,
            &now,
        ),
    ) {
        return db_err(req, "db_insert_failed", e, Some("courses"));
    }

    info!(course_id = %course_id, code = %code, "course created");
    ok(&req.id, json!({ "courseId": course_id, "targetGrade": target_grade }))
}

fn handle_courses_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let course = match course_row_json(conn, &course_id) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "course not found", None),
        Err(e) => return db_err(req, "db_query_failed", e, None),
    };
    let weights = match list_weights_json(conn, &course_id) {
        Ok(v) => v,
        Err(e) => return db_err(req, "db_query_failed", e, None),
    };
    let assignments = match list_assignments_json(conn, &course_id) {
        Ok(v) => v,
        Err(e) => return db_err(req, "db_query_failed", e, None),
    };

    ok(
        &req.id,
        json!({
            "course": course,
            "weights": weights,
            "assignments": assignments
        }),
    )
}

fn handle_courses_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };
    if let Err(e) = require_course(conn, req, &course_id) {
        return e;
    }

    let mut set_parts: Vec<String> = Vec::new();
    let mut bind_values: Vec<Value> = Vec::new();

    for key in ["code", "name"] {
        if let Some(v) = patch.get(key) {
            let Some(s) = v.as_str().map(str::trim) else {
                return err(&req.id, "bad_params", format!("patch.{key} must be a string"), None);
            };
            if s.is_empty() {
                return err(&req.id, "bad_params", format!("{key} must not be empty"), None);
            }
            set_parts.push(format!("{key} = ?"));
            bind_values.push(Value::Text(s.to_string()));
        }
    }
    if let Some(v) = patch.get("semester") {
        if v.is_null() {
            set_parts.push("semester = ?".into());
            bind_values.push(Value::Null);
        } else if let Some(s) = v.as_str() {
            set_parts.push("semester = ?".into());
            bind_values.push(Value::Text(s.trim().to_string()));
        } else {
            return err(&req.id, "bad_params", "patch.semester must be a string or null", None);
        }
    }
    if let Some(v) = patch.get("year") {
        if v.is_null() {
            set_parts.push("year = ?".into());
            bind_values.push(Value::Null);
        } else if let Some(n) = v.as_i64() {
            set_parts.push("year = ?".into());
            bind_values.push(Value::Integer(n));
        } else {
            return err(&req.id, "bad_params", "patch.year must be an integer or null", None);
        }
    }
    if let Some(v) = patch.get("targetGrade") {
        let Some(n) = v.as_f64() else {
            return err(&req.id, "bad_params", "patch.targetGrade must be a number", None);
        };
        let n = match valid_target(req, n) {
            Ok(v) => v,
            Err(e) => return e,
        };
        set_parts.push("target_grade = ?".into());
        bind_values.push(Value::Real(n));
    }

    if set_parts.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "patch must include at least one field",
            None,
        );
    }

    set_parts.push("updated_at = ?".into());
    bind_values.push(Value::Text(db::now_rfc3339()));
    bind_values.push(Value::Text(course_id.clone()));

    let sql = format!("UPDATE courses SET {} WHERE id = ?", set_parts.join(", "));
    if let Err(e) = conn.execute(&sql, params_from_iter(bind_values)) {
        return db_err(req, "db_update_failed", e, Some("courses"));
    }

    match course_row_json(conn, &course_id) {
        Ok(Some(course)) => ok(&req.id, json!({ "course": course })),
        Ok(None) => err(&req.id, "not_found", "course not found", None),
        Err(e) => db_err(req, "db_query_failed", e, None),
    }
}

fn handle_courses_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    // Weights, assignments and grades go with the course (ON DELETE CASCADE).
    match conn.execute("DELETE FROM courses WHERE id = ?", [&course_id]) {
        Ok(0) => err(&req.id, "not_found", "course not found", None),
        Ok(_) => {
            info!(course_id = %course_id, "course deleted");
            ok(&req.id, json!({ "ok": true }))
        }
        Err(e) => db_err(req, "db_delete_failed", e, Some("courses")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.create" => Some(handle_courses_create(state, req)),
        "courses.get" => Some(handle_courses_get(state, req)),
        "courses.update" => Some(handle_courses_update(state, req)),
        "courses.delete" => Some(handle_courses_delete(state, req)),
        _ => None,
    }
}
