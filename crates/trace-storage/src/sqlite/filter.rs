//! Translation of record and status filters into SQL WHERE clauses.

use rusqlite::types::ToSql;
use serde_json::Value;

use trace_core::filter::{AttrMatch, ParentMatch, RecordFilter, RecordOrder, StatusFilter};
use trace_core::window::EndBound;

use crate::error::Result;
use crate::sqlite::records::format_datetime;

/// Positional parameters collected while building a statement.
#[derive(Default)]
pub(crate) struct Params {
    values: Vec<Box<dyn ToSql>>,
}

impl Params {
    /// Stores a value and returns its `?N` placeholder.
    pub(crate) fn push(&mut self, value: impl ToSql + 'static) -> String {
        self.values.push(Box::new(value));
        format!("?{}", self.values.len())
    }

    pub(crate) fn as_refs(&self) -> Vec<&dyn ToSql> {
        self.values.iter().map(|p| p.as_ref()).collect()
    }
}

/// A WHERE clause (without the keyword) plus its parameters.
pub(crate) struct WhereClause {
    pub(crate) sql: String,
    pub(crate) params: Params,
}

fn join_clauses(clauses: Vec<String>) -> String {
    if clauses.is_empty() {
        "1 = 1".to_string()
    } else {
        clauses.join(" AND ")
    }
}

/// Matches one scalar JSON value at `path`, comparing the JSON type as well
/// so that `true` never equals `1` and `1` never equals `1.0`.
fn json_value_match(params: &mut Params, path: &str, value: &Value) -> String {
    let kind = format!("json_type(attributes, {path})");
    let extract = format!("json_extract(attributes, {path})");
    match value {
        Value::Bool(true) => format!("{kind} = 'true'"),
        Value::Bool(false) => format!("{kind} = 'false'"),
        Value::Number(n) => match n.as_i64() {
            Some(i) => {
                let p = params.push(i);
                format!("({kind} = 'integer' AND {extract} = {p})")
            }
            None => {
                let p = params.push(n.as_f64().unwrap_or(f64::NAN));
                format!("({kind} = 'real' AND {extract} = {p})")
            }
        },
        Value::String(s) => {
            let p = params.push(s.clone());
            format!("({kind} = 'text' AND {extract} = {p})")
        }
        _ => format!("{extract} IS NULL"),
    }
}

/// Builds the WHERE clause for a record query.
pub(crate) fn record_where(filter: &RecordFilter) -> Result<WhereClause> {
    filter.attributes.validate()?;

    let mut clauses: Vec<String> = Vec::new();
    let mut params = Params::default();

    if let Some(ref owner) = filter.owner_type {
        let p = params.push(owner.as_str().to_string());
        clauses.push(format!("owner_type = {p}"));
    }

    if !filter.ids.is_empty() {
        let placeholders: Vec<String> = filter
            .ids
            .iter()
            .map(|id| params.push(id.clone()))
            .collect();
        clauses.push(format!("id IN ({})", placeholders.join(", ")));
    }

    match filter.parent {
        ParentMatch::Any => {}
        ParentMatch::Root => clauses.push("parent_id IS NULL".to_string()),
        ParentMatch::ChildOf(ref parent) => {
            let p = params.push(parent.clone());
            clauses.push(format!("parent_id = {p}"));
        }
    }

    for (key, pred) in filter.attributes.iter() {
        let path = params.push(format!("$.\"{key}\""));
        match pred {
            AttrMatch::IsNull | AttrMatch::Eq(Value::Null) => {
                clauses.push(format!("json_extract(attributes, {path}) IS NULL"));
            }
            AttrMatch::Eq(value) => {
                clauses.push(json_value_match(&mut params, &path, value));
            }
            AttrMatch::AnyOf(values) => {
                let mut alternatives: Vec<String> = values
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(|v| json_value_match(&mut params, &path, v))
                    .collect();
                if values.iter().any(Value::is_null) {
                    alternatives.push(format!("json_extract(attributes, {path}) IS NULL"));
                }
                if alternatives.is_empty() {
                    clauses.push("0 = 1".to_string());
                } else {
                    clauses.push(format!("({})", alternatives.join(" OR ")));
                }
            }
        }
    }

    if let Some(ref window) = filter.window {
        let p = params.push(format_datetime(&window.instant));
        let end_cmp = match window.end_bound {
            EndBound::Inclusive => ">=",
            EndBound::Exclusive => ">",
        };
        clauses.push(format!(
            "(start_at IS NOT NULL AND start_at <= {p} AND (end_at IS NULL OR end_at {end_cmp} {p}))"
        ));
    }

    if let Some(ref status_id) = filter.status_id {
        let p = params.push(status_id.clone());
        clauses.push(format!("status_id = {p}"));
    }

    Ok(WhereClause {
        sql: join_clauses(clauses),
        params,
    })
}

/// ORDER BY and LIMIT suffix for a record query.
pub(crate) fn record_order(filter: &RecordFilter) -> String {
    let order = match filter.order {
        RecordOrder::Id => "id ASC",
        RecordOrder::Label => "label ASC, id ASC",
        RecordOrder::CreatedAt => "created_at ASC, id ASC",
        RecordOrder::Start => "start_at ASC, id ASC",
    };
    let limit = filter
        .limit
        .map(|l| format!(" LIMIT {l}"))
        .unwrap_or_default();
    format!(" ORDER BY {order}{limit}")
}

/// Builds the WHERE clause for a status query.
pub(crate) fn status_where(filter: &StatusFilter) -> WhereClause {
    let mut clauses: Vec<String> = Vec::new();
    let mut params = Params::default();

    if let Some(ref owner) = filter.owner_type {
        let p = params.push(owner.as_str().to_string());
        clauses.push(format!("owner_type = {p}"));
    }
    if let Some(is_default) = filter.is_default {
        let p = params.push(i64::from(is_default));
        clauses.push(format!("is_default = {p}"));
    }
    if !filter.ids.is_empty() {
        let placeholders: Vec<String> = filter
            .ids
            .iter()
            .map(|id| params.push(id.clone()))
            .collect();
        clauses.push(format!("id IN ({})", placeholders.join(", ")));
    }

    WhereClause {
        sql: join_clauses(clauses),
        params,
    }
}
