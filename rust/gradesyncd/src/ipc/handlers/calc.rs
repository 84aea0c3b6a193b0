use crate::calc::{GradeCalculator, GradeError, GradeSummary, LetterScale, TargetSolver};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, db_err, grade_err, optional_f64, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use tracing::{debug, info, warn};

pub(crate) const LETTER_SCALE_KEY: &str = "calc.letter_scale";

/// The workspace letter scale and where it came from ("default" or "override").
pub(crate) fn active_letter_scale(conn: &Connection) -> anyhow::Result<(LetterScale, &'static str)> {
    let Some(raw) = db::settings_get_json(conn, LETTER_SCALE_KEY)? else {
        return Ok((LetterScale::default(), "default"));
    };
    match serde_json::from_value::<LetterScale>(raw) {
        Ok(scale) => match scale.validate() {
            Ok(()) => Ok((scale, "override")),
            Err(e) => {
                warn!(error = %e, "stored letter scale is invalid; using default");
                Ok((LetterScale::default(), "default"))
            }
        },
        Err(e) => {
            warn!(error = %e, "stored letter scale is unreadable; using default");
            Ok((LetterScale::default(), "default"))
        }
    }
}

pub(crate) struct CourseCalculation {
    pub target_grade: f64,
    pub summary: Result<GradeSummary, GradeError>,
}

/// Loads one course and runs the calculator over it. `None` when the course does not exist.
pub(crate) fn calculate_course(
    conn: &Connection,
    course_id: &str,
) -> anyhow::Result<Option<CourseCalculation>> {
    let Some(inputs) = db::load_course_inputs(conn, course_id)? else {
        return Ok(None);
    };
    let (scale, _) = active_letter_scale(conn)?;
    let summary = GradeCalculator::new(&inputs.weights, &inputs.ledger, &scale).calculate();
    Ok(Some(CourseCalculation {
        target_grade: inputs.target_grade,
        summary,
    }))
}

pub(crate) fn summary_json(summary: &GradeSummary) -> serde_json::Value {
    let mut v = json!(summary);
    if let Some(obj) = v.as_object_mut() {
        obj.insert("configured".into(), json!(true));
    }
    v
}

/// Calculation errors are a normal state of a course still being set up, so they
/// travel as a result rather than an error response.
pub(crate) fn not_configured_json(e: &GradeError) -> serde_json::Value {
    json!({
        "configured": false,
        "code": e.code(),
        "message": e.to_string(),
    })
}

fn load_calculation(
    conn: &Connection,
    req: &Request,
    course_id: &str,
) -> Result<CourseCalculation, serde_json::Value> {
    match calculate_course(conn, course_id) {
        Ok(Some(c)) => Ok(c),
        Ok(None) => Err(err(&req.id, "not_found", "course not found", None)),
        Err(e) => Err(db_err(req, "db_query_failed", e, None)),
    }
}

fn handle_course_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let calc = match load_calculation(conn, req, &course_id) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match calc.summary {
        Ok(summary) => {
            let mut result = summary_json(&summary);
            if let Some(obj) = result.as_object_mut() {
                obj.insert("targetGrade".into(), json!(calc.target_grade));
            }
            ok(&req.id, result)
        }
        Err(e) => ok(&req.id, not_configured_json(&e)),
    }
}

fn handle_grade_needed(state: &mut AppState, req: &Request) -> serde_json::Value {
    let max_achievable = state.config.max_achievable;
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let target = match optional_f64(req, "target") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let solver = match TargetSolver::new(max_achievable) {
        Ok(v) => v,
        Err(e) => return grade_err(req, &e),
    };
    let calc = match load_calculation(conn, req, &course_id) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let summary = match calc.summary {
        Ok(v) => v,
        Err(e) => return ok(&req.id, not_configured_json(&e)),
    };
    let target = target.unwrap_or(calc.target_grade);
    let report = match solver.solve(&summary, target) {
        Ok(v) => v,
        Err(e) => return grade_err(req, &e),
    };

    debug!(
        course_id = %course_id,
        target,
        needed_average = ?report.outcome.needed_average(),
        "grade needed solved"
    );

    let mut result = json!(report);
    if let Some(obj) = result.as_object_mut() {
        obj.insert("configured".into(), json!(true));
        obj.insert("letterGrade".into(), json!(summary.letter_grade));
        obj.insert("maxAchievable".into(), json!(solver.max_achievable()));
    }
    ok(&req.id, result)
}

fn handle_letter_scale_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match active_letter_scale(conn) {
        Ok((scale, source)) => ok(&req.id, json!({ "scale": scale, "source": source })),
        Err(e) => db_err(req, "db_query_failed", e, Some("settings")),
    }
}

fn handle_letter_scale_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw) = req.params.get("scale") else {
        return err(&req.id, "bad_params", "missing scale", None);
    };
    let scale = match serde_json::from_value::<LetterScale>(raw.clone()) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("scale must be {{bands:[{{minPercent, letter}}], floorLetter}}: {e}"),
                None,
            )
        }
    };
    let scale = match LetterScale::new(scale.bands, &scale.floor_letter) {
        Ok(v) => v,
        Err(e) => return grade_err(req, &e),
    };

    if let Err(e) = db::settings_set_json(conn, LETTER_SCALE_KEY, &json!(scale)) {
        return db_err(req, "db_update_failed", e, Some("settings"));
    }
    info!(bands = scale.bands.len(), "letter scale override saved");
    ok(&req.id, json!({ "scale": scale, "source": "override" }))
}

fn handle_letter_scale_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::settings_delete(conn, LETTER_SCALE_KEY) {
        Ok(cleared) => ok(
            &req.id,
            json!({
                "cleared": cleared,
                "scale": LetterScale::default(),
                "source": "default"
            }),
        ),
        Err(e) => db_err(req, "db_delete_failed", e, Some("settings")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calc.courseSummary" => Some(handle_course_summary(state, req)),
        "calc.gradeNeeded" => Some(handle_grade_needed(state, req)),
        "calc.letterScale.get" => Some(handle_letter_scale_get(state, req)),
        "calc.letterScale.update" => Some(handle_letter_scale_update(state, req)),
        "calc.letterScale.clearOverride" => Some(handle_letter_scale_clear(state, req)),
        _ => None,
    }
}
