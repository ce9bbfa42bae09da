use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Skills, StudentRecord};

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    name: String,
    roll: String,
    python: f64,
    ml: f64,
    experience_years: Option<u32>,
}

impl CsvRow {
    fn into_record(self, line: usize) -> anyhow::Result<StudentRecord> {
        for (label, value) in [("python", self.python), ("ml", self.ml)] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!(
                    "row {line} ({}): {label} proficiency {value} must be a fraction between 0 and 1",
                    self.roll
                );
            }
        }
        Ok(StudentRecord {
            id: Uuid::new_v4(),
            name: self.name,
            roll: self.roll,
            skills: Skills {
                python: self.python,
                ml: self.ml,
            },
            experience_years: self.experience_years.unwrap_or(0),
        })
    }
}

pub fn read_csv(csv_path: &Path) -> anyhow::Result<Vec<StudentRecord>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut students = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("malformed row {line}"))?;
        students.push(row.into_record(line)?);
    }

    Ok(students)
}

/// Where the matching service reads students from.
#[derive(Debug, Clone)]
pub enum StudentStore {
    Postgres(PgPool),
    Memory(Arc<Vec<StudentRecord>>),
}

impl StudentStore {
    pub fn memory(students: Vec<StudentRecord>) -> Self {
        StudentStore::Memory(Arc::new(students))
    }

    pub async fn find_by_roll(&self, roll: &str) -> anyhow::Result<Option<StudentRecord>> {
        match self {
            StudentStore::Postgres(pool) => fetch_student(pool, roll).await,
            StudentStore::Memory(students) => Ok(students
                .iter()
                .find(|student| student.roll == roll)
                .cloned()),
        }
    }

    pub async fn all(&self) -> anyhow::Result<Vec<StudentRecord>> {
        match self {
            StudentStore::Postgres(pool) => fetch_students(pool).await,
            StudentStore::Memory(students) => Ok(students.as_ref().clone()),
        }
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Starter roster written by `seed`.
pub fn seed_roster() -> Vec<StudentRecord> {
    [
        ("Alice Gupta", "21CS001", 0.92, 0.74, 3),
        ("Bob Smith", "21CS002", 0.41, 0.88, 1),
        ("Kiara Patel", "21CS003", 0.67, 0.0, 2),
        ("Jules Moreno", "21CS004", 0.85, 0.81, 4),
    ]
    .into_iter()
    .map(|(name, roll, python, ml, experience)| StudentRecord {
        id: Uuid::new_v4(),
        name: name.to_string(),
        roll: roll.to_string(),
        skills: Skills { python, ml },
        experience_years: experience,
    })
    .collect()
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    upsert_students(pool, &seed_roster()).await
}

pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let students = read_csv(csv_path)?;
    upsert_students(pool, &students).await
}

async fn upsert_students(pool: &PgPool, students: &[StudentRecord]) -> anyhow::Result<usize> {
    let mut written = 0usize;

    for student in students {
        if upsert_student(pool, student).await? {
            written += 1;
        }
    }

    Ok(written)
}

async fn upsert_student(pool: &PgPool, student: &StudentRecord) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO skill_match.students
        (id, full_name, roll, python_level, ml_level, experience_years)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (roll) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            python_level = EXCLUDED.python_level,
            ml_level = EXCLUDED.ml_level,
            experience_years = EXCLUDED.experience_years,
            updated_at = now()
        "#,
    )
    .bind(student.id)
    .bind(&student.name)
    .bind(&student.roll)
    .bind(student.skills.python)
    .bind(student.skills.ml)
    .bind(i32::try_from(student.experience_years).context("experience_years out of range")?)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

const SELECT_STUDENTS: &str = "SELECT id, full_name, roll, python_level, ml_level, experience_years \
     FROM skill_match.students";

pub async fn fetch_students(pool: &PgPool) -> anyhow::Result<Vec<StudentRecord>> {
    let query = format!("{SELECT_STUDENTS} ORDER BY roll");
    let rows = sqlx::query(&query).fetch_all(pool).await?;
    rows.iter().map(student_from_row).collect()
}

pub async fn fetch_student(pool: &PgPool, roll: &str) -> anyhow::Result<Option<StudentRecord>> {
    let query = format!("{SELECT_STUDENTS} WHERE roll = $1");
    let row = sqlx::query(&query).bind(roll).fetch_optional(pool).await?;
    row.as_ref().map(student_from_row).transpose()
}

fn student_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<StudentRecord> {
    let experience: i32 = row.get("experience_years");
    Ok(StudentRecord {
        id: row.get("id"),
        name: row.get("full_name"),
        roll: row.get("roll"),
        skills: Skills {
            python: row.get("python_level"),
            ml: row.get("ml_level"),
        },
        experience_years: u32::try_from(experience).unwrap_or(0),
    })
}
