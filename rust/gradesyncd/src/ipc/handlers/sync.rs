use std::collections::HashMap;

use crate::calc::{AssignmentLedger, GradeError};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, db_err, require_course, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::assignments::DEFAULT_CATEGORY;
use super::calc::{calculate_course, not_configured_json, summary_json};
use super::grades::upsert_grade;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncAssignment {
    external_id: String,
    name: String,
    category: Option<String>,
    max_points: f64,
    due_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncGrade {
    external_id: String,
    points_earned: f64,
    feedback: Option<String>,
    graded_date: Option<String>,
}

#[derive(Debug, Default)]
struct SyncCounts {
    assignments_inserted: usize,
    assignments_updated: usize,
    grades_upserted: usize,
    grades_skipped: usize,
}

fn parse_list<T: for<'de> Deserialize<'de>>(
    req: &Request,
    key: &str,
) -> Result<Vec<T>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(Vec::new()),
        Some(v) if v.is_null() => Ok(Vec::new()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| err(&req.id, "bad_params", format!("invalid {key}: {e}"), None)),
    }
}

fn item_err(req: &Request, list: &str, index: usize, e: &GradeError) -> serde_json::Value {
    let mut details = e.details().unwrap_or_else(|| json!({}));
    if let Some(obj) = details.as_object_mut() {
        obj.insert("list".into(), json!(list));
        obj.insert("index".into(), json!(index));
    }
    err(
        &req.id,
        e.code(),
        format!("{list}[{index}]: {e}"),
        Some(details),
    )
}

fn normalize_assignment(a: &mut SyncAssignment) -> Result<(), GradeError> {
    a.external_id = a.external_id.trim().to_string();
    a.name = a.name.trim().to_string();
    if a.external_id.is_empty() {
        return Err(GradeError::validation("externalId", "externalId must not be empty"));
    }
    if a.name.is_empty() {
        return Err(GradeError::validation("name", "name must not be empty"));
    }
    let category = a
        .category
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string();
    AssignmentLedger::validate_assignment(&category, a.max_points)?;
    a.category = Some(category);
    Ok(())
}

fn normalize_grade(g: &mut SyncGrade) -> Result<(), GradeError> {
    g.external_id = g.external_id.trim().to_string();
    if g.external_id.is_empty() {
        return Err(GradeError::validation("externalId", "externalId must not be empty"));
    }
    AssignmentLedger::validate_points(g.points_earned)
}

fn assignment_by_external_id(
    conn: &Connection,
    course_id: &str,
    external_id: &str,
) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM assignments WHERE course_id = ? AND external_id = ?",
        (course_id, external_id),
        |r| r.get(0),
    )
    .optional()
}

fn apply_batch(
    conn: &Connection,
    course_id: &str,
    assignments: &[SyncAssignment],
    grades: &[SyncGrade],
) -> rusqlite::Result<SyncCounts> {
    let mut counts = SyncCounts::default();
    let mut ids: HashMap<&str, String> = HashMap::new();
    let now = db::now_rfc3339();

    let mut next_sort: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM assignments WHERE course_id = ?",
        [course_id],
        |r| r.get(0),
    )?;

    for a in assignments {
        let category = a.category.as_deref().unwrap_or(DEFAULT_CATEGORY);
        match assignment_by_external_id(conn, course_id, &a.external_id)? {
            Some(id) => {
                conn.execute(
                    "UPDATE assignments
                     SET name = ?, category = ?, max_points = ?, due_date = ?, description = ?,
                         updated_at = ?
                     WHERE id = ?",
                    (
                        &a.name,
                        category,
                        a.max_points,
                        &a.due_date,
                        &a.description,
                        &now,
                        &id,
                    ),
                )?;
                counts.assignments_updated += 1;
                ids.insert(&a.external_id, id);
            }
            None => {
                let id = Uuid::new_v4().to_string();
                conn.execute(
                    "INSERT INTO assignments(id, course_id, name, category, max_points, due_date,
                                             description, external_id, sort_order, created_at, updated_at)
                     VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    (
                        &id,
                        course_id,
                        &a.name,
                        category,
                        a.max_points,
                        &a.due_date,
                        &a.description,
                        &a.external_id,
                        next_sort,
                        &now,
                        &now,
                    ),
                )?;
                next_sort += 1;
                counts.assignments_inserted += 1;
                ids.insert(&a.external_id, id);
            }
        }
    }

    for g in grades {
        let assignment_id = match ids.get(g.external_id.as_str()) {
            Some(id) => Some(id.clone()),
            None => assignment_by_external_id(conn, course_id, &g.external_id)?,
        };
        let Some(assignment_id) = assignment_id else {
            warn!(course_id, external_id = %g.external_id, "grade for unknown assignment skipped");
            counts.grades_skipped += 1;
            continue;
        };
        upsert_grade(
            conn,
            &assignment_id,
            g.points_earned,
            g.feedback.as_deref(),
            g.graded_date.as_deref(),
        )?;
        counts.grades_upserted += 1;
    }

    Ok(counts)
}

fn handle_sync_apply(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut assignments: Vec<SyncAssignment> = match parse_list(req, "assignments") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut grades: Vec<SyncGrade> = match parse_list(req, "grades") {
        Ok(v) => v,
        Err(e) => return e,
    };

    // Reject the whole batch before touching the database.
    for (i, a) in assignments.iter_mut().enumerate() {
        if let Err(e) = normalize_assignment(a) {
            return item_err(req, "assignments", i, &e);
        }
    }
    for (i, g) in grades.iter_mut().enumerate() {
        if let Err(e) = normalize_grade(g) {
            return item_err(req, "grades", i, &e);
        }
    }
    if let Err(e) = require_course(conn, req, &course_id) {
        return e;
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return db_err(req, "db_tx_failed", e, None),
    };
    let counts = match apply_batch(&tx, &course_id, &assignments, &grades) {
        Ok(v) => v,
        Err(e) => return db_err(req, "db_update_failed", e, None),
    };
    if let Err(e) = tx.commit() {
        return db_err(req, "db_tx_failed", e, None);
    }

    info!(
        course_id = %course_id,
        inserted = counts.assignments_inserted,
        updated = counts.assignments_updated,
        grades = counts.grades_upserted,
        skipped = counts.grades_skipped,
        "sync batch applied"
    );

    let summary = match calculate_course(conn, &course_id) {
        Ok(Some(calc)) => match calc.summary {
            Ok(summary) => summary_json(&summary),
            Err(e) => not_configured_json(&e),
        },
        Ok(None) => return err(&req.id, "not_found", "course not found", None),
        Err(e) => return db_err(req, "db_query_failed", e, None),
    };

    ok(
        &req.id,
        json!({
            "assignmentsInserted": counts.assignments_inserted,
            "assignmentsUpdated": counts.assignments_updated,
            "gradesUpserted": counts.grades_upserted,
            "gradesSkipped": counts.grades_skipped,
            "summary": summary
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sync.apply" => Some(handle_sync_apply(state, req)),
        _ => None,
    }
}
