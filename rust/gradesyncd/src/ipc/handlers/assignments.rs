use crate::calc::AssignmentLedger;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, db_err, grade_err, optional_str, require_course, required_f64, required_str,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

/// Category used when an assignment arrives without one.
pub(crate) const DEFAULT_CATEGORY: &str = "Homework";

pub(crate) fn list_assignments_json(
    conn: &Connection,
    course_id: &str,
) -> rusqlite::Result<Vec<serde_json::Value>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.name, a.category, a.max_points, a.due_date, a.description,
                a.external_id, a.sort_order,
                g.points_earned, g.feedback, g.graded_date
         FROM assignments a
         LEFT JOIN grades g ON g.assignment_id = a.id
         WHERE a.course_id = ?
         ORDER BY a.sort_order",
    )?;
    let rows = stmt
        .query_map([course_id], |r| {
            let max_points: f64 = r.get(3)?;
            let points_earned: Option<f64> = r.get(8)?;
            let feedback: Option<String> = r.get(9)?;
            let graded_date: Option<String> = r.get(10)?;
            let grade = points_earned.map(|p| {
                json!({
                    "pointsEarned": p,
                    "percentage": p / max_points * 100.0,
                    "feedback": feedback,
                    "gradedDate": graded_date,
                })
            });
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "category": r.get::<_, String>(2)?,
                "maxPoints": max_points,
                "dueDate": r.get::<_, Option<String>>(4)?,
                "description": r.get::<_, Option<String>>(5)?,
                "externalId": r.get::<_, Option<String>>(6)?,
                "sortOrder": r.get::<_, i64>(7)?,
                "grade": grade,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn handle_assignments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    match list_assignments_json(conn, &course_id) {
        Ok(assignments) => ok(&req.id, json!({ "assignments": assignments })),
        Err(e) => db_err(req, "db_query_failed", e, None),
    }
}

fn handle_assignments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let max_points = match required_f64(req, "maxPoints") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let category = match req.params.get("category") {
        None => DEFAULT_CATEGORY.to_string(),
        Some(v) if v.is_null() => DEFAULT_CATEGORY.to_string(),
        Some(v) => match v.as_str() {
            Some(s) => s.trim().to_string(),
            None => return err(&req.id, "bad_params", "category must be a string", None),
        },
    };
    let due_date = match optional_str(req, "dueDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let description = match optional_str(req, "description") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let external_id = match optional_str(req, "externalId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    if let Err(e) = AssignmentLedger::validate_assignment(&category, max_points) {
        return grade_err(req, &e);
    }
    if let Err(e) = require_course(conn, req, &course_id) {
        return e;
    }

    let sort_order: i64 = match conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM assignments WHERE course_id = ?",
        [&course_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return db_err(req, "db_query_failed", e, None),
    };

    let assignment_id = Uuid::new_v4().to_string();
    let now = db::now_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO assignments(id, course_id, name, category, max_points, due_date, description,
                                 external_id, sort_order, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &assignment_id,
            &course_id,
            &name,
            &category,
            max_points,
            &due_date,
            &description,
            &external_id,
            sort_order,
            &now,
            &now,
        ),
    ) {
        return db_err(req, "db_insert_failed", e, Some("assignments"));
    }

    info!(course_id = %course_id, assignment_id = %assignment_id, category = %category, "assignment added");
    ok(&req.id, json!({ "assignmentId": assignment_id }))
}

fn handle_assignments_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    // The grade row cascades with the assignment.
    match conn.execute(
        "DELETE FROM assignments WHERE id = ? AND course_id = ?",
        (&assignment_id, &course_id),
    ) {
        Ok(0) => err(&req.id, "not_found", "assignment not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => db_err(req, "db_delete_failed", e, Some("assignments")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.list" => Some(handle_assignments_list(state, req)),
        "assignments.create" => Some(handle_assignments_create(state, req)),
        "assignments.delete" => Some(handle_assignments_delete(state, req)),
        _ => None,
    }
}
