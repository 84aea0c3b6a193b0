use crate::calc::WeightTable;
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

pub(crate) fn list_weights_json(
    conn: &Connection,
    course_id: &str,
) -> rusqlite::Result<Vec<serde_json::Value>> {
    let mut stmt = conn.prepare(
        "SELECT id, category, weight, description, sort_order
         FROM syllabus_weights
         WHERE course_id = ?
         ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map([course_id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "category": r.get::<_, String>(1)?,
                "weight": r.get::<_, f64>(2)?,
                "description": r.get::<_, Option<String>>(3)?,
                "sortOrder": r.get::<_, i64>(4)?,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn handle_weights_list(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    match list_weights_json(conn, &course_id) {
        Ok(weights) => {
            let total: f64 = weights
                .iter()
                .filter_map(|w| w.get("weight").and_then(|v| v.as_f64()))
                .sum();
            ok(&req.id, json!({ "weights": weights, "totalWeight": total }))
        }
        Err(e) => db_err(req, "db_query_failed", e, None),
    }
}

fn handle_weights_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let category = match req.params.get("category").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing category", None),
    };
    let weight = match required_f64(req, "weight") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let description = match optional_str(req, "description") {
        Ok(v) => v,
        Err(e) => return e,
    };

    if let Err(e) = WeightTable::validate_entry(&category, weight) {
        return grade_err(req, &e);
    }
    if let Err(e) = require_course(conn, req, &course_id) {
        return e;
    }

    let sort_order: i64 = match conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM syllabus_weights WHERE course_id = ?",
        [&course_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return db_err(req, "db_query_failed", e, None),
    };

    let weight_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO syllabus_weights(id, course_id, category, weight, description, sort_order, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &weight_id,
            &course_id,
            &category,
            weight,
            &description,
            sort_order,
            db::now_rfc3339(),
        ),
    ) {
        return db_err(req, "db_insert_failed", e, Some("syllabus_weights"));
    }

    info!(course_id = %course_id, category = %category, weight, "syllabus weight added");
    ok(&req.id, json!({ "weightId": weight_id }))
}

fn handle_weights_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let weight_id = match required_str(req, "weightId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match conn.execute(
        "DELETE FROM syllabus_weights WHERE id = ? AND course_id = ?",
        (&weight_id, &course_id),
    ) {
        Ok(0) => err(&req.id, "not_found", "weight not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => db_err(req, "db_delete_failed", e, Some("syllabus_weights")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "weights.list" => Some(handle_weights_list(state, req)),
        "weights.create" => Some(handle_weights_create(state, req)),
        "weights.delete" => Some(handle_weights_delete(state, req)),
        _ => None,
    }
}
