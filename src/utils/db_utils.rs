use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use sqlx::MySqlPool;
use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::{QueryAs, QueryScalar};

use crate::error::{AppError, FieldErrors};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
///
/// Only keys listed in `allowed` may appear in the payload; anything else is
/// reported as a field error, so column names never come from the client.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, AppError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| FieldErrors::single("body", "must be a JSON object"))?;

    if obj.is_empty() {
        return Err(FieldErrors::single("body", "no fields provided for update"));
    }

    let mut errors = FieldErrors::new();
    for key in obj.keys() {
        if !allowed.contains(&key.as_str()) {
            errors.add(key, "cannot be updated");
        }
    }
    errors.into_result()?;

    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(obj.len() + 1);

    // Convert JSON values → SqlValue
    for (key, value) in obj {
        let v = match value {
            Value::String(s) => {
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    SqlValue::Date(d)
                } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                    SqlValue::DateTime(dt)
                } else {
                    SqlValue::String(s.clone())
                }
            }
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    SqlValue::U64(u)
                } else if let Some(i) = n.as_i64() {
                    SqlValue::I64(i)
                } else if let Some(f) = n.as_f64() {
                    SqlValue::F64(f)
                } else {
                    return Err(FieldErrors::single(key, "unsupported number"));
                }
            }
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Null => SqlValue::Null,
            _ => return Err(FieldErrors::single(key, "unsupported value type")),
        };
        values.push(v);
    }

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// Serializes a typed patch, dropping absent (`None`) fields.
pub fn patch_fields<T: Serialize>(patch: &T) -> Value {
    match serde_json::to_value(patch) {
        Ok(Value::Object(map)) => {
            Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect())
        }
        _ => Value::Object(Default::default()),
    }
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// ===============================
/// List filters
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    U64(u64),
    Str(String),
    Date(NaiveDate),
}

/// Accumulates `AND`-joined conditions and their bind values, so the same
/// WHERE clause can serve both the COUNT and the page query.
#[derive(Debug, Default)]
pub struct Filters {
    conditions: Vec<String>,
    args: Vec<FilterValue>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, condition: &str, args: impl IntoIterator<Item = FilterValue>) {
        self.conditions.push(condition.to_string());
        self.args.extend(args);
    }

    pub fn eq_u64(&mut self, column: &str, value: Option<u64>) {
        if let Some(v) = value {
            self.push(&format!("{} = ?", column), [FilterValue::U64(v)]);
        }
    }

    pub fn eq_str(&mut self, column: &str, value: Option<&str>) {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.push(&format!("{} = ?", column), [FilterValue::Str(v.to_string())]);
        }
    }

    /// `(a LIKE ? OR b LIKE ? ...)` with the same `%term%` for each column.
    pub fn search(&mut self, columns: &[&str], term: Option<&str>) {
        if let Some(t) = term.map(str::trim).filter(|t| !t.is_empty()) {
            let like = format!("%{}%", t);
            let cond = columns
                .iter()
                .map(|c| format!("{} LIKE ?", c))
                .collect::<Vec<_>>()
                .join(" OR ");
            self.push(
                &format!("({})", cond),
                columns.iter().map(|_| FilterValue::Str(like.clone())),
            );
        }
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn bind_as<'q, O>(
        &self,
        mut query: QueryAs<'q, MySql, O, MySqlArguments>,
    ) -> QueryAs<'q, MySql, O, MySqlArguments> {
        for arg in &self.args {
            query = match arg.clone() {
                FilterValue::U64(v) => query.bind(v),
                FilterValue::Str(v) => query.bind(v),
                FilterValue::Date(v) => query.bind(v),
            };
        }
        query
    }

    pub fn bind_scalar<'q, O>(
        &self,
        mut query: QueryScalar<'q, MySql, O, MySqlArguments>,
    ) -> QueryScalar<'q, MySql, O, MySqlArguments> {
        for arg in &self.args {
            query = match arg.clone() {
                FilterValue::U64(v) => query.bind(v),
                FilterValue::Str(v) => query.bind(v),
                FilterValue::Date(v) => query.bind(v),
            };
        }
        query
    }
}

/// Page number, page size and row offset from optional query values.
pub fn paginate(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(default_per_page).clamp(1, 100);
    // u32 * 100 always fits in u64
    let offset = u64::from(page - 1) * u64::from(per_page);
    (page, per_page, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: &[&str] = &["first_name", "hire_date", "hourly_rate", "manager"];

    #[test]
    fn builds_set_clause_for_allowed_columns() {
        let update = build_update_sql(
            "employees",
            &json!({"first_name": "Jane", "hire_date": "2024-02-01", "hourly_rate": 21.5}),
            COLUMNS,
            "id",
            9,
        )
        .unwrap();

        assert!(update.sql.starts_with("UPDATE employees SET "));
        assert!(update.sql.ends_with(" WHERE id = ?"));
        assert_eq!(update.sql.matches(" = ?").count(), 4);
        assert!(update.values.contains(&SqlValue::Date(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        )));
        assert!(update.values.contains(&SqlValue::F64(21.5)));
        assert_eq!(update.values.last(), Some(&SqlValue::U64(9)));
    }

    #[test]
    fn unknown_columns_are_field_errors() {
        let err = build_update_sql(
            "employees",
            &json!({"first_name": "Jane", "id = 1; DROP TABLE employees; --": 1}),
            COLUMNS,
            "id",
            9,
        )
        .unwrap_err();

        match err {
            AppError::Validation(fields) => {
                assert!(fields.get("id = 1; DROP TABLE employees; --").is_some());
                assert!(fields.get("first_name").is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_and_non_object_payloads_rejected() {
        assert!(build_update_sql("employees", &json!({}), COLUMNS, "id", 1).is_err());
        assert!(build_update_sql("employees", &json!([1, 2]), COLUMNS, "id", 1).is_err());
    }

    #[test]
    fn patch_drops_absent_fields() {
        #[derive(Serialize)]
        struct Patch {
            first_name: Option<String>,
            manager: Option<String>,
        }

        let v = patch_fields(&Patch {
            first_name: Some("Jane".into()),
            manager: None,
        });
        assert_eq!(v, json!({"first_name": "Jane"}));
    }

    #[test]
    fn filters_skip_absent_values() {
        let mut f = Filters::new();
        f.eq_u64("employee_id", None);
        f.eq_str("status", Some("  "));
        assert_eq!(f.where_clause(), "");

        f.eq_u64("employee_id", Some(7));
        f.eq_str("status", Some("approved"));
        f.search(&["first_name", "email"], Some("jo"));

        assert_eq!(
            f.where_clause(),
            "WHERE employee_id = ? AND status = ? AND (first_name LIKE ? OR email LIKE ?)"
        );
        assert_eq!(f.args.len(), 4);
        assert_eq!(f.args[3], FilterValue::Str("%jo%".into()));
    }

    #[test]
    fn pagination_bounds() {
        assert_eq!(paginate(None, None, 20), (1, 20, 0));
        assert_eq!(paginate(Some(0), Some(500), 20), (1, 100, 0));
        assert_eq!(paginate(Some(3), Some(10), 20), (3, 10, 20));
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        assert_eq!(
            paginate(Some(u32::MAX), Some(100), 10),
            (u32::MAX, 100, (u64::from(u32::MAX) - 1) * 100)
        );
    }
}
