use crate::calc::{AssignmentLedger, WeightTable};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "gradesync.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            semester TEXT,
            year INTEGER,
            target_grade REAL NOT NULL DEFAULT 85.0,
            external_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // Duplicate categories are allowed on purpose; lookups sum them.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS syllabus_weights(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            category TEXT NOT NULL,
            weight REAL NOT NULL,
            description TEXT,
            sort_order INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_syllabus_weights_course ON syllabus_weights(course_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            max_points REAL NOT NULL,
            due_date TEXT,
            description TEXT,
            sort_order INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id) ON DELETE CASCADE
        )",
        [],
    )?;
    ensure_assignments_external_id(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_course ON assignments(course_id, sort_order)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_external ON assignments(course_id, external_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            assignment_id TEXT NOT NULL UNIQUE,
            points_earned REAL NOT NULL,
            feedback TEXT,
            graded_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(assignment_id) REFERENCES assignments(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn settings_delete(conn: &Connection, key: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM settings WHERE key = ?", [key])?;
    Ok(n > 0)
}

pub fn course_exists(conn: &Connection, course_id: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
}

/// Everything the calculator needs for one course, read in a single pass.
pub struct CourseInputs {
    pub target_grade: f64,
    pub weights: WeightTable,
    pub ledger: AssignmentLedger,
}

pub fn load_course_inputs(conn: &Connection, course_id: &str) -> anyhow::Result<Option<CourseInputs>> {
    let target_grade: Option<f64> = conn
        .query_row(
            "SELECT target_grade FROM courses WHERE id = ?",
            [course_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(target_grade) = target_grade else {
        return Ok(None);
    };

    let mut weights = WeightTable::new();
    let mut weights_stmt = conn.prepare(
        "SELECT category, weight, description
         FROM syllabus_weights
         WHERE course_id = ?
         ORDER BY sort_order",
    )?;
    let weight_rows = weights_stmt
        .query_map([course_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, f64>(1)?,
                r.get::<_, Option<String>>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (category, weight, description) in weight_rows {
        weights.add_weight(&category, weight, description.as_deref())?;
    }

    let mut ledger = AssignmentLedger::new();
    let mut assignments_stmt = conn.prepare(
        "SELECT a.id, a.name, a.category, a.max_points, g.points_earned
         FROM assignments a
         LEFT JOIN grades g ON g.assignment_id = a.id
         WHERE a.course_id = ?
         ORDER BY a.sort_order",
    )?;
    let assignment_rows = assignments_stmt
        .query_map([course_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, f64>(3)?,
                r.get::<_, Option<f64>>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (id, name, category, max_points, points_earned) in assignment_rows {
        ledger.add_assignment(&id, &name, &category, max_points)?;
        if let Some(points) = points_earned {
            ledger.record_grade(&id, points)?;
        }
    }

    Ok(Some(CourseInputs {
        target_grade,
        weights,
        ledger,
    }))
}

fn ensure_assignments_external_id(conn: &Connection) -> anyhow::Result<()> {
    // Workspaces created before LMS sync have no external_id column.
    if table_has_column(conn, "assignments", "external_id")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE assignments ADD COLUMN external_id TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
