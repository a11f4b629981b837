use rusqlite::Connection;
use std::path::Path;

pub fn open_db(data_dir: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("coursebook.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT,
            group_name TEXT,
            status TEXT NOT NULL,
            progress REAL NOT NULL DEFAULT 0,
            enrolled_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_group ON students(group_name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_status ON students(status)",
        [],
    )?;

    // Early databases predate the progress column. Add it when missing.
    ensure_students_progress(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS facilitators(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT,
            department TEXT,
            title TEXT,
            active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_facilitators_department ON facilitators(department)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS learning_modules(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            language TEXT NOT NULL DEFAULT 'en',
            complexity TEXT NOT NULL DEFAULT 'basic',
            estimated_load INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'draft',
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    ensure_modules_sort_order(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_learning_modules_status ON learning_modules(status)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_learning_modules_sort ON learning_modules(sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessments(
            id TEXT PRIMARY KEY,
            module_id TEXT NOT NULL,
            title TEXT NOT NULL,
            kind TEXT NOT NULL,
            max_score REAL NOT NULL DEFAULT 100,
            passing_score REAL NOT NULL DEFAULT 50,
            scheduled_for TEXT,
            status TEXT NOT NULL DEFAULT 'planned',
            FOREIGN KEY(module_id) REFERENCES learning_modules(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_module ON assessments(module_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_scheduled ON assessments(scheduled_for)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS portfolio_items(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            title TEXT NOT NULL,
            kind TEXT NOT NULL,
            url TEXT,
            grade REAL,
            submitted_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_portfolio_items_student ON portfolio_items(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS reflections(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            module_id TEXT,
            body TEXT NOT NULL,
            mood TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(module_id) REFERENCES learning_modules(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reflections_student ON reflections(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reflections_module ON reflections(module_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS simulation_scenarios(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            category TEXT,
            difficulty INTEGER NOT NULL DEFAULT 1,
            duration_minutes INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_simulation_scenarios_category ON simulation_scenarios(category)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS simulation_results(
            id TEXT PRIMARY KEY,
            scenario_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            score REAL NOT NULL,
            passed INTEGER NOT NULL,
            duration_seconds INTEGER NOT NULL DEFAULT 0,
            completed_at TEXT NOT NULL,
            FOREIGN KEY(scenario_id) REFERENCES simulation_scenarios(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_simulation_results_scenario ON simulation_results(scenario_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_simulation_results_student ON simulation_results(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS trajectories(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            title TEXT NOT NULL,
            target_role TEXT,
            progress REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'draft',
            updated_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_trajectories_student ON trajectories(student_id)",
        [],
    )?;

    Ok(conn)
}

fn ensure_students_progress(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "progress")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE students ADD COLUMN progress REAL NOT NULL DEFAULT 0",
        [],
    )?;
    Ok(())
}

fn ensure_modules_sort_order(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "learning_modules", "sort_order")? {
        return Ok(());
    }

    conn.execute(
        "ALTER TABLE learning_modules ADD COLUMN sort_order INTEGER NOT NULL DEFAULT 0",
        [],
    )?;

    // Backfill using title order as a best-effort.
    let mut stmt = conn.prepare("SELECT id FROM learning_modules ORDER BY title")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    for (i, id) in ids.iter().enumerate() {
        conn.execute(
            "UPDATE learning_modules SET sort_order = ? WHERE id = ?",
            (i as i64, id),
        )?;
    }

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
