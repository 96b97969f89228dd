//! # Named-Parameter Compilation
//!
//! Turns `:name` templates into the positional placeholder syntax of a
//! dialect plus the ordered argument list.
//!
//! ## Rewriting Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Template:  UPDATE notes SET title = :title WHERE id = :id             │
//! │  Params:    { id: 7, title: "a" }                                      │
//! │                                                                         │
//! │  Sqlite/MySql → UPDATE notes SET title = ? WHERE id = ?    ["a", 7]    │
//! │  Postgres     → UPDATE notes SET title = $1 WHERE id = $2  ["a", 7]    │
//! │                                                                         │
//! │  Left untouched:                                                        │
//! │  • '::' casts          created_at::date                                │
//! │  • ':=' assignments    @n := @n + 1                                     │
//! │  • quoted text         '10:30', "odd:column"                            │
//! │  • a ':' not followed by a name character                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A name repeated in the template is bound once per occurrence.

use crate::dialect::Dialect;
use crate::error::BindError;
use crate::value::{Params, Value};

fn is_name_start(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

/// Compiles a named template for `dialect`.
///
/// ## Returns
/// * `Ok((sql, args))` - positional SQL and one argument per placeholder
/// * `Err(BindError::MissingParam)` - the first name absent from `params`
pub fn compile_named(
    dialect: Dialect,
    template: &str,
    params: &Params,
) -> Result<(String, Vec<Value>), BindError> {
    let mut sql = String::with_capacity(template.len());
    let mut args = Vec::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                sql.push(c);
                // a doubled quote closes and reopens, which copies the same text
                for q in chars.by_ref() {
                    sql.push(q);
                    if q == c {
                        break;
                    }
                }
            }
            ':' => match chars.peek().copied() {
                Some(next @ (':' | '=')) => {
                    sql.push(':');
                    sql.push(next);
                    chars.next();
                }
                Some(next) if is_name_start(next) => {
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if !is_name_char(n) {
                            break;
                        }
                        name.push(n);
                        chars.next();
                    }

                    let value = params
                        .get(&name)
                        .ok_or_else(|| BindError::MissingParam(name.clone()))?;
                    args.push(value.clone());
                    sql.push_str(&dialect.placeholder(args.len()));
                }
                _ => sql.push(':'),
            },
            _ => sql.push(c),
        }
    }

    Ok((sql, args))
}

/// Rewrites `?` placeholders into the dialect's positional syntax.
///
/// Only PostgreSQL changes; quoted text is left alone.
pub fn rebind(dialect: Dialect, sql: &str) -> String {
    if dialect != Dialect::Postgres {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len() + 8);
    let mut position = 0;
    let mut chars = sql.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push(c);
                for q in chars.by_ref() {
                    out.push(q);
                    if q == c {
                        break;
                    }
                }
            }
            '?' => {
                position += 1;
                out.push_str(&dialect.placeholder(position));
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_params() -> Params {
        Params::new().with("id", 7_i64).with("title", "a")
    }

    #[test]
    fn test_question_mark_dialects() {
        let (sql, args) = compile_named(
            Dialect::Sqlite,
            "UPDATE notes SET title = :title WHERE id = :id",
            &note_params(),
        )
        .unwrap();

        assert_eq!(sql, "UPDATE notes SET title = ? WHERE id = ?");
        assert_eq!(args, vec![Value::Text("a".into()), Value::Int(7)]);
    }

    #[test]
    fn test_postgres_numbers_in_order() {
        let (sql, args) = compile_named(
            Dialect::Postgres,
            "SELECT * FROM notes WHERE id = :id OR parent_id = :id",
            &note_params(),
        )
        .unwrap();

        assert_eq!(sql, "SELECT * FROM notes WHERE id = $1 OR parent_id = $2");
        assert_eq!(args, vec![Value::Int(7), Value::Int(7)]);
    }

    #[test]
    fn test_missing_param_is_reported() {
        let err = compile_named(
            Dialect::MySql,
            "UPDATE notes SET body = :body WHERE id = :id",
            &note_params(),
        )
        .unwrap_err();

        assert_eq!(err, BindError::MissingParam("body".to_string()));
    }

    #[test]
    fn test_casts_quotes_and_assignments_pass_through() {
        let (sql, args) = compile_named(
            Dialect::Postgres,
            "SELECT created_at::date, '10:30', \"a:b\", @n := 1, x : y FROM t WHERE id = :id",
            &note_params(),
        )
        .unwrap();

        assert_eq!(
            sql,
            "SELECT created_at::date, '10:30', \"a:b\", @n := 1, x : y FROM t WHERE id = $1"
        );
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_dotted_names() {
        let params = Params::new().with("page.size", 20_i64);
        let (sql, _) = compile_named(Dialect::Sqlite, "LIMIT :page.size", &params).unwrap();
        assert_eq!(sql, "LIMIT ?");
    }

    #[test]
    fn test_rebind() {
        assert_eq!(
            rebind(Dialect::Postgres, "a = ? AND b = '?' AND c = ?"),
            "a = $1 AND b = '?' AND c = $2"
        );
        assert_eq!(rebind(Dialect::MySql, "a = ?"), "a = ?");
    }
}
