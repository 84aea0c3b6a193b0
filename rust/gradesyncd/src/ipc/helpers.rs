use crate::calc::GradeError;
use crate::db;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use tracing::error;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Required, non-blank string param (trimmed).
pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{} must not be empty", key),
            None,
        )),
        None => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

/// Absent, null and blank strings all read as `None`.
pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => match v.as_str() {
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => Ok(Some(s.trim().to_string())),
            None => Err(err(
                &req.id,
                "bad_params",
                format!("{} must be a string or null", key),
                None,
            )),
        },
    }
}

pub fn optional_f64(req: &Request, key: &str) -> Result<Option<f64>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be a number", key),
                None,
            )
        }),
    }
}

pub fn required_f64(req: &Request, key: &str) -> Result<f64, serde_json::Value> {
    optional_f64(req, key)?
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_i64(req: &Request, key: &str) -> Result<Option<i64>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be an integer", key),
                None,
            )
        }),
    }
}

pub fn grade_err(req: &Request, e: &GradeError) -> serde_json::Value {
    err(&req.id, e.code(), e.to_string(), e.details())
}

pub fn require_course(conn: &Connection, req: &Request, course_id: &str) -> Result<(), serde_json::Value> {
    match db::course_exists(conn, course_id) {
        Ok(true) => Ok(()),
        Ok(false) => Err(err(&req.id, "not_found", "course not found", None)),
        Err(e) => Err(db_err(req, "db_query_failed", e, None)),
    }
}

pub fn db_err(
    req: &Request,
    code: &str,
    e: impl std::fmt::Display,
    table: Option<&str>,
) -> serde_json::Value {
    error!(method = %req.method, code, error = %e, "database error");
    err(
        &req.id,
        code,
        e.to_string(),
        table.map(|t| json!({ "table": t })),
    )
}
