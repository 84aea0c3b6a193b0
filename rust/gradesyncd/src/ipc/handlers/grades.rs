use crate::calc::AssignmentLedger;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, db_err, grade_err, optional_str, require_course, required_f64, required_str,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn assignment_exists(conn: &Connection, assignment_id: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM assignments WHERE id = ?", [assignment_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
}

/// Inserts or replaces the single grade row of an assignment.
pub(crate) fn upsert_grade(
    conn: &Connection,
    assignment_id: &str,
    points_earned: f64,
    feedback: Option<&str>,
    graded_date: Option<&str>,
) -> rusqlite::Result<()> {
    let now = db::now_rfc3339();
    conn.execute(
        "INSERT INTO grades(id, assignment_id, points_earned, feedback, graded_date, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(assignment_id) DO UPDATE SET
           points_earned = excluded.points_earned,
           feedback = excluded.feedback,
           graded_date = excluded.graded_date,
           updated_at = excluded.updated_at",
        (
            Uuid::new_v4().to_string(),
            assignment_id,
            points_earned,
            feedback,
            graded_date,
            &now,
            &now,
        ),
    )?;
    Ok(())
}

fn grade_json(conn: &Connection, assignment_id: &str) -> rusqlite::Result<Option<serde_json::Value>> {
    conn.query_row(
        "SELECT g.id, g.assignment_id, g.points_earned, a.max_points, g.feedback, g.graded_date,
                g.created_at, g.updated_at
         FROM grades g
         JOIN assignments a ON a.id = g.assignment_id
         WHERE g.assignment_id = ?",
        [assignment_id],
        |r| {
            let points_earned: f64 = r.get(2)?;
            let max_points: f64 = r.get(3)?;
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "assignmentId": r.get::<_, String>(1)?,
                "pointsEarned": points_earned,
                "maxPoints": max_points,
                "percentage": points_earned / max_points * 100.0,
                "feedback": r.get::<_, Option<String>>(4)?,
                "gradedDate": r.get::<_, Option<String>>(5)?,
                "createdAt": r.get::<_, String>(6)?,
                "updatedAt": r.get::<_, String>(7)?,
            }))
        },
    )
    .optional()
}

fn handle_grades_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let points_earned = match required_f64(req, "pointsEarned") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let feedback = match optional_str(req, "feedback") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let graded_date = match optional_str(req, "gradedDate") {
        Ok(v) => v,
        Err(e) => return e,
    };

    if let Err(e) = AssignmentLedger::validate_points(points_earned) {
        return grade_err(req, &e);
    }
    match assignment_exists(conn, &assignment_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "assignment not found", None),
        Err(e) => return db_err(req, "db_query_failed", e, None),
    }

    if let Err(e) = upsert_grade(
        conn,
        &assignment_id,
        points_earned,
        feedback.as_deref(),
        graded_date.as_deref(),
    ) {
        return db_err(req, "db_insert_failed", e, Some("grades"));
    }

    match grade_json(conn, &assignment_id) {
        Ok(Some(grade)) => ok(&req.id, json!({ "grade": grade })),
        Ok(None) => err(&req.id, "not_found", "grade not found", None),
        Err(e) => db_err(req, "db_query_failed", e, None),
    }
}

fn handle_grades_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match assignment_exists(conn, &assignment_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "assignment not found", None),
        Err(e) => return db_err(req, "db_query_failed", e, None),
    }
    match grade_json(conn, &assignment_id) {
        Ok(Some(grade)) => ok(&req.id, json!({ "grade": grade })),
        Ok(None) => err(
            &req.id,
            "not_found",
            "no grade found for this assignment",
            None,
        ),
        Err(e) => db_err(req, "db_query_failed", e, None),
    }
}

fn handle_grades_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match conn.execute("DELETE FROM grades WHERE assignment_id = ?", [&assignment_id]) {
        Ok(0) => err(&req.id, "not_found", "no grade to delete", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => db_err(req, "db_delete_failed", e, Some("grades")),
    }
}

fn handle_grades_list_for_course(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = require_course(conn, req, &course_id) {
        return e;
    }

    let mut stmt = match conn.prepare(
        "SELECT g.assignment_id, a.name, a.category, a.max_points, g.points_earned,
                g.feedback, g.graded_date
         FROM grades g
         JOIN assignments a ON a.id = g.assignment_id
         WHERE a.course_id = ?
         ORDER BY a.sort_order",
    ) {
        Ok(s) => s,
        Err(e) => return db_err(req, "db_query_failed", e, None),
    };
    let rows = stmt
        .query_map([&course_id], |r| {
            let max_points: f64 = r.get(3)?;
            let points_earned: f64 = r.get(4)?;
            Ok(json!({
                "assignmentId": r.get::<_, String>(0)?,
                "assignmentName": r.get::<_, String>(1)?,
                "assignmentCategory": r.get::<_, String>(2)?,
                "maxPoints": max_points,
                "pointsEarned": points_earned,
                "percentage": points_earned / max_points * 100.0,
                "feedback": r.get::<_, Option<String>>(5)?,
                "gradedDate": r.get::<_, Option<String>>(6)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(grades) => ok(&req.id, json!({ "grades": grades })),
        Err(e) => db_err(req, "db_query_failed", e, None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.upsert" => Some(handle_grades_upsert(state, req)),
        "grades.get" => Some(handle_grades_get(state, req)),
        "grades.delete" => Some(handle_grades_delete(state, req)),
        "grades.listForCourse" => Some(handle_grades_list_for_course(state, req)),
        _ => None,
    }
}
