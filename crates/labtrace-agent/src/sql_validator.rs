//! The `execute_sql` validator contract (§4.9): read-only, single
//! statement, bounded `LIMIT`, identifiers resolved against the schema
//! snapshot, and — when a patient is selected among more than one — a
//! strict literal-equality filter on `patient_id`.

use sqlparser::ast::{BinaryOperator, Expr, SetExpr, Statement, Value};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use labtrace_core::types::PatientId;
use labtrace_schema::SchemaSnapshot;

use crate::error::{AgentError, Result};

/// A SQL comment marker found within this many characters of the substring
/// `patient_id` is treated as adjacent, per §4.9's "reject SQL comment
/// sequences adjacent to the patient filter".
const COMMENT_ADJACENCY_WINDOW: usize = 40;

pub struct ValidatedSql {
    pub sql: String,
}

/// Validate and normalize a read-only query, injecting `LIMIT limit_cap` if
/// the query has none. `required_patient_id` is `Some` only when scope
/// enforcement applies (owner has more than one patient and a patient is
/// selected).
pub fn validate(
    raw_sql: &str,
    schema: &SchemaSnapshot,
    limit_cap: u64,
    required_patient_id: Option<PatientId>,
) -> Result<ValidatedSql> {
    reject_adjacent_comments(raw_sql)?;

    let dialect = PostgreSqlDialect {};
    let statements = Parser::parse_sql(&dialect, raw_sql)
        .map_err(|e| AgentError::Validation(format!("sql did not parse: {e}")))?;

    if statements.len() != 1 {
        return Err(AgentError::Validation("only a single statement is permitted".into()));
    }

    let mut query = match statements.into_iter().next().unwrap() {
        Statement::Query(q) => *q,
        other => {
            return Err(AgentError::Validation(format!(
                "only read-only SELECT/WITH statements are permitted, got {other:?}"
            )))
        }
    };

    if let Some(required) = required_patient_id {
        enforce_patient_scope(raw_sql, &query.body, required)?;
    }

    if query.limit.is_none() {
        query.limit = Some(Expr::Value(Value::Number(limit_cap.to_string(), false)));
    } else if let Some(Expr::Value(Value::Number(n, _))) = &query.limit {
        let requested: u64 = n.parse().unwrap_or(limit_cap);
        if requested > limit_cap {
            query.limit = Some(Expr::Value(Value::Number(limit_cap.to_string(), false)));
        }
    }

    resolve_identifiers(&query.body, schema)?;

    Ok(ValidatedSql { sql: query.to_string() })
}

fn reject_adjacent_comments(raw_sql: &str) -> Result<()> {
    let lower = raw_sql.to_lowercase();
    for (idx, _) in lower.match_indices("patient_id") {
        let window_start = idx.saturating_sub(COMMENT_ADJACENCY_WINDOW);
        let window_end = (idx + COMMENT_ADJACENCY_WINDOW).min(lower.len());
        let window = &lower[window_start..window_end];
        if window.contains("--") || window.contains("/*") {
            return Err(AgentError::ScopeViolation(
                "sql comment adjacent to patient filter is not permitted".into(),
            ));
        }
    }
    Ok(())
}

fn resolve_identifiers(body: &SetExpr, schema: &SchemaSnapshot) -> Result<()> {
    let select = match body {
        SetExpr::Select(s) => s,
        SetExpr::Query(inner) => return resolve_identifiers(&inner.body, schema),
        SetExpr::SetOperation { left, .. } => return resolve_identifiers(left, schema),
        _ => return Ok(()),
    };

    for table in &select.from {
        if let sqlparser::ast::TableFactor::Table { name, .. } = &table.relation {
            let ident = name.to_string();
            if schema.resolve(&ident).is_none() {
                return Err(AgentError::Validation(format!("unknown table: {ident}")));
            }
        }
    }
    Ok(())
}

/// Walk the WHERE clause for a literal `patient_id = '<uuid>'` (or
/// table-qualified / quoted variants) equal to `required`, reject negation
/// forms, and reject any other UUID literal appearing anywhere in the
/// statement text.
fn enforce_patient_scope(raw_sql: &str, body: &SetExpr, required: PatientId) -> Result<()> {
    let required_str = required.to_uuid_string();

    if contains_negated_patient_filter(body) {
        return Err(AgentError::ScopeViolation(
            "negation on patient_id is not permitted".into(),
        ));
    }

    if !has_equality_filter(body, &required_str) {
        return Err(AgentError::ScopeViolation(format!(
            "query must filter patient_id = '{required_str}'"
        )));
    }

    for candidate in extract_uuid_literals(raw_sql) {
        if candidate != required_str {
            return Err(AgentError::ScopeViolation(format!(
                "statement references a patient id other than the selected one: {candidate}"
            )));
        }
    }

    Ok(())
}

fn select_of(body: &SetExpr) -> Option<&sqlparser::ast::Select> {
    match body {
        SetExpr::Select(s) => Some(s),
        SetExpr::Query(inner) => select_of(&inner.body),
        SetExpr::SetOperation { left, .. } => select_of(left),
        _ => None,
    }
}

fn has_equality_filter(body: &SetExpr, required: &str) -> bool {
    let Some(select) = select_of(body) else {
        return false;
    };
    let Some(selection) = &select.selection else {
        return false;
    };
    expr_has_patient_equality(selection, required)
}

fn expr_has_patient_equality(expr: &Expr, required: &str) -> bool {
    match expr {
        Expr::BinaryOp { left, op: BinaryOperator::Eq, right } => {
            is_patient_id_column(left) && literal_matches(right, required)
                || is_patient_id_column(right) && literal_matches(left, required)
        }
        Expr::BinaryOp { left, op: BinaryOperator::And, right } => {
            expr_has_patient_equality(left, required) || expr_has_patient_equality(right, required)
        }
        Expr::Nested(inner) => expr_has_patient_equality(inner, required),
        _ => false,
    }
}

fn contains_negated_patient_filter(body: &SetExpr) -> bool {
    let Some(select) = select_of(body) else {
        return false;
    };
    let Some(selection) = &select.selection else {
        return false;
    };
    expr_has_patient_negation(selection)
}

fn expr_has_patient_negation(expr: &Expr) -> bool {
    match expr {
        Expr::BinaryOp { left, op: BinaryOperator::NotEq, right } => {
            is_patient_id_column(left) || is_patient_id_column(right)
        }
        Expr::IsNotNull(inner) => is_patient_id_column(inner),
        Expr::InList { expr, negated: true, .. } => is_patient_id_column(expr),
        Expr::UnaryOp { op: sqlparser::ast::UnaryOperator::Not, expr: inner } => {
            expr_has_patient_negation(inner) || patient_id_appears(inner)
        }
        Expr::BinaryOp { left, op: BinaryOperator::And, right }
        | Expr::BinaryOp { left, op: BinaryOperator::Or, right } => {
            expr_has_patient_negation(left) || expr_has_patient_negation(right)
        }
        Expr::Nested(inner) => expr_has_patient_negation(inner),
        _ => false,
    }
}

fn patient_id_appears(expr: &Expr) -> bool {
    is_patient_id_column(expr)
}

fn is_patient_id_column(expr: &Expr) -> bool {
    match expr {
        Expr::Identifier(ident) => ident.value.eq_ignore_ascii_case("patient_id"),
        Expr::CompoundIdentifier(parts) => parts
            .last()
            .is_some_and(|p| p.value.eq_ignore_ascii_case("patient_id")),
        _ => false,
    }
}

fn literal_matches(expr: &Expr, required: &str) -> bool {
    match expr {
        Expr::Value(Value::SingleQuotedString(s)) => s.eq_ignore_ascii_case(required),
        Expr::Cast { expr, .. } => literal_matches(expr, required),
        _ => false,
    }
}

fn extract_uuid_literals(raw_sql: &str) -> Vec<String> {
    const HEX: &str = "0123456789abcdefABCDEF";
    let bytes = raw_sql.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i + 36 <= bytes.len() {
        let candidate = &raw_sql[i..i + 36];
        if is_uuid_shape(candidate, HEX) {
            found.push(candidate.to_lowercase());
            i += 36;
        } else {
            i += 1;
        }
    }
    found
}

fn is_uuid_shape(s: &str, hex: &str) -> bool {
    let dashes = [8, 13, 18, 23];
    for (i, c) in s.char_indices() {
        if dashes.contains(&i) {
            if c != '-' {
                return false;
            }
        } else if !hex.contains(c) {
            return false;
        }
    }
    true
}

trait PatientIdStr {
    fn to_uuid_string(&self) -> String;
}

impl PatientIdStr for PatientId {
    fn to_uuid_string(&self) -> String {
        self.as_uuid().to_string().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrace_schema::{ColumnInfo, TableManifest};

    fn schema() -> SchemaSnapshot {
        SchemaSnapshot {
            tables: vec![TableManifest {
                physical_name: "lab_results".to_string(),
                semantic_aliases: vec!["results".to_string()],
                columns: vec![ColumnInfo {
                    column_name: "patient_id".to_string(),
                    data_type: "uuid".to_string(),
                    is_nullable: false,
                }],
            }],
            snapshot_id: "test".to_string(),
        }
    }

    #[test]
    fn injects_default_limit_when_absent() {
        let sql = "SELECT * FROM lab_results";
        let v = validate(sql, &schema(), 50, None).expect("valid");
        assert!(v.sql.to_uppercase().contains("LIMIT 50"));
    }

    #[test]
    fn caps_an_excessive_limit() {
        let sql = "SELECT * FROM lab_results LIMIT 999999";
        let v = validate(sql, &schema(), 50, None).expect("valid");
        assert!(v.sql.contains("LIMIT 50"));
    }

    #[test]
    fn rejects_non_select_statements() {
        let sql = "DELETE FROM lab_results";
        assert!(validate(sql, &schema(), 50, None).is_err());
    }

    #[test]
    fn rejects_multiple_statements() {
        let sql = "SELECT 1; SELECT 2";
        assert!(validate(sql, &schema(), 50, None).is_err());
    }

    #[test]
    fn requires_patient_filter_when_scoped() {
        let patient = PatientId::new();
        let sql = "SELECT * FROM lab_results";
        assert!(validate(sql, &schema(), 50, Some(patient)).is_err());
    }

    #[test]
    fn accepts_literal_patient_equality() {
        let patient = PatientId::new();
        let sql = format!(
            "SELECT * FROM lab_results WHERE patient_id = '{}'",
            patient.to_uuid_string()
        );
        assert!(validate(&sql, &schema(), 50, Some(patient)).is_ok());
    }

    #[test]
    fn rejects_other_uuid_in_statement() {
        let patient = PatientId::new();
        let other = PatientId::new();
        let sql = format!(
            "SELECT * FROM lab_results WHERE patient_id = '{}' OR patient_id = '{}'",
            patient.to_uuid_string(),
            other.to_uuid_string()
        );
        assert!(validate(&sql, &schema(), 50, Some(patient)).is_err());
    }

    #[test]
    fn rejects_negated_patient_filter() {
        let patient = PatientId::new();
        let sql = format!("SELECT * FROM lab_results WHERE patient_id != '{}'", patient.to_uuid_string());
        assert!(validate(&sql, &schema(), 50, Some(patient)).is_err());
    }

    #[test]
    fn rejects_comment_adjacent_to_patient_filter() {
        let patient = PatientId::new();
        let sql = format!(
            "SELECT * FROM lab_results WHERE patient_id /* sneaky */ = '{}'",
            patient.to_uuid_string()
        );
        assert!(validate(&sql, &schema(), 50, Some(patient)).is_err());
    }
}
