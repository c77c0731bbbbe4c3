// Server variables
//
// Static table answered by SHOW VARIABLES and by `SELECT @@name`. Names keep
// their `@@` prefix and optional `session.` / `GLOBAL.` scope.

use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarValue {
    Int(i64),
    Str(&'static str),
}

impl VarValue {
    pub fn to_json(&self) -> JsonValue {
        match self {
            VarValue::Int(v) => JsonValue::from(*v),
            VarValue::Str(v) => JsonValue::from(*v),
        }
    }

    /// Text form used by SHOW VARIABLES
    pub fn to_text(&self) -> String {
        match self {
            VarValue::Int(v) => v.to_string(),
            VarValue::Str(v) => v.to_string(),
        }
    }
}

pub const SERVER_VARIABLES: &[(&str, VarValue)] = &[
    ("@@session.auto_increment_increment", VarValue::Int(1)),
    ("@@auto_increment_increment", VarValue::Int(1)),
    ("@@session.autocommit", VarValue::Int(1)),
    ("@@autocommit", VarValue::Int(1)),
    ("@@character_set_client", VarValue::Str("utf8")),
    ("@@character_set_connection", VarValue::Str("utf8")),
    ("@@character_set_results", VarValue::Str("utf8")),
    ("@@character_set_server", VarValue::Str("latin1")),
    ("@@collation_server", VarValue::Str("latin1_swedish_ci")),
    ("@@collation_connection", VarValue::Str("utf8_general_ci")),
    ("@@init_connect", VarValue::Str("")),
    ("@@interactive_timeout", VarValue::Int(28800)),
    ("@@license", VarValue::Str("GPL")),
    ("@@lower_case_table_names", VarValue::Int(0)),
    ("@@max_allowed_packet", VarValue::Int(16777216)),
    ("@@net_buffer_length", VarValue::Int(16384)),
    ("@@net_write_timeout", VarValue::Int(60)),
    ("@@performance_schema", VarValue::Int(0)),
    ("@@query_cache_size", VarValue::Int(1048576)),
    ("@@query_cache_type", VarValue::Str("OFF")),
    (
        "@@sql_mode",
        VarValue::Str("ONLY_FULL_GROUP_BY,STRICT_TRANS_TABLES,NO_ZERO_IN_DATE,NO_ZERO_DATE,ERROR_FOR_DIVISION_BY_ZERO,NO_ENGINE_SUBSTITUTION"),
    ),
    ("@@system_time_zone", VarValue::Str("UTC")),
    ("@@time_zone", VarValue::Str("SYSTEM")),
    ("@@session.tx_isolation", VarValue::Str("REPEATABLE-READ")),
    ("@@tx_isolation", VarValue::Str("REPEATABLE-READ")),
    ("@@session.transaction_isolation", VarValue::Str("REPEATABLE-READ")),
    ("@@GLOBAL.transaction_isolation", VarValue::Str("REPEATABLE-READ")),
    ("@@transaction_isolation", VarValue::Str("REPEATABLE-READ")),
    ("@@session.transaction_read_only", VarValue::Int(0)),
    ("@@transaction_read_only", VarValue::Int(0)),
    ("@@wait_timeout", VarValue::Int(28800)),
    ("@@version", VarValue::Str("8.0.17")),
    ("@@version_comment", VarValue::Str("(MindsDB)")),
    ("@@ssl_cipher", VarValue::Str("")),
    ("@@GLOBAL.max_execution_time", VarValue::Int(0)),
];

/// Value of `@@name`; `name` is given without the `@@` prefix
pub fn lookup_variable(name: &str) -> Option<VarValue> {
    let wanted = format!("@@{}", name);
    SERVER_VARIABLES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(&wanted))
        .map(|(_, v)| *v)
}

/// (name, value) pairs for SHOW [SESSION|GLOBAL] VARIABLES
///
/// Scoped names lose their scope prefix. With `session_only` only the
/// `session.` entries are listed. The first occurrence of a name wins.
pub fn variables_listing(session_only: bool) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for (name, value) in SERVER_VARIABLES {
        let name = name.trim_start_matches("@@");
        let is_session = name.starts_with("session.");
        if session_only && !is_session {
            continue;
        }
        let bare = name
            .strip_prefix("session.")
            .or_else(|| name.strip_prefix("GLOBAL."))
            .unwrap_or(name);
        match out.iter_mut().find(|(n, _)| n == bare) {
            Some(existing) if is_session || name.starts_with("GLOBAL.") => existing.1 = value.to_text(),
            Some(_) => {}
            None => out.push((bare.to_string(), value.to_text())),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_variable() {
        assert_eq!(lookup_variable("version"), Some(VarValue::Str("8.0.17")));
        assert_eq!(lookup_variable("session.autocommit"), Some(VarValue::Int(1)));
        assert!(lookup_variable("nope").is_none());
    }

    #[test]
    fn test_session_listing_strips_scope() {
        let session = variables_listing(true);
        assert!(session.iter().all(|(n, _)| !n.starts_with("session.")));
        assert!(session.iter().any(|(n, v)| n == "autocommit" && v == "1"));
        assert!(!session.iter().any(|(n, _)| n == "version"));

        let all = variables_listing(false);
        assert_eq!(all.iter().filter(|(n, _)| n == "transaction_isolation").count(), 1);
        assert!(all.iter().any(|(n, _)| n == "version"));
    }
}
