// Catalog table registry
//
// Compiled-in definitions of every information_schema table. Column names and
// their order are part of the client-facing contract.

use crate::error::{SqlApiError, SqlResult};

/// Immutable definition of one virtual table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualTable {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

const SCHEMATA_COLUMNS: &[&str] = &[
    "CATALOG_NAME", "SCHEMA_NAME", "DEFAULT_CHARACTER_SET_NAME", "DEFAULT_COLLATION_NAME",
    "SQL_PATH",
];

const TABLES_COLUMNS: &[&str] = &[
    "TABLE_CATALOG", "TABLE_SCHEMA", "TABLE_NAME", "TABLE_TYPE", "ENGINE", "VERSION",
    "ROW_FORMAT", "TABLE_ROWS", "AVG_ROW_LENGTH", "DATA_LENGTH", "MAX_DATA_LENGTH",
    "INDEX_LENGTH", "DATA_FREE", "AUTO_INCREMENT", "CREATE_TIME", "UPDATE_TIME",
    "CHECK_TIME", "TABLE_COLLATION", "CHECKSUM", "CREATE_OPTIONS", "TABLE_COMMENT",
];

/// Field count of a TABLES row
pub const TABLES_WIDTH: usize = TABLES_COLUMNS.len();

const COLUMNS_COLUMNS: &[&str] = &[
    "TABLE_CATALOG", "TABLE_SCHEMA", "TABLE_NAME", "COLUMN_NAME", "ORDINAL_POSITION",
    "COLUMN_DEFAULT", "IS_NULLABLE", "DATA_TYPE", "CHARACTER_MAXIMUM_LENGTH",
    "CHARACTER_OCTET_LENGTH", "NUMERIC_PRECISION", "NUMERIC_SCALE", "DATETIME_PRECISION",
    "CHARACTER_SET_NAME", "COLLATION_NAME", "COLUMN_TYPE", "COLUMN_KEY", "EXTRA",
    "PRIVILEGES", "COLUMN_COMMENT", "GENERATION_EXPRESSION",
];

const EVENTS_COLUMNS: &[&str] = &[
    "EVENT_CATALOG", "EVENT_SCHEMA", "EVENT_NAME", "DEFINER", "TIME_ZONE", "EVENT_BODY",
    "EVENT_DEFINITION", "EVENT_TYPE", "EXECUTE_AT", "INTERVAL_VALUE", "INTERVAL_FIELD",
    "SQL_MODE", "STARTS", "ENDS", "STATUS", "ON_COMPLETION", "CREATED", "LAST_ALTERED",
    "LAST_EXECUTED", "EVENT_COMMENT", "ORIGINATOR", "CHARACTER_SET_CLIENT",
    "COLLATION_CONNECTION", "DATABASE_COLLATION",
];

const ROUTINES_COLUMNS: &[&str] = &[
    "SPECIFIC_NAME", "ROUTINE_CATALOG", "ROUTINE_SCHEMA", "ROUTINE_NAME", "ROUTINE_TYPE",
    "DATA_TYPE", "CHARACTER_MAXIMUM_LENGTH", "CHARACTER_OCTET_LENGTH", "NUMERIC_PRECISION",
    "NUMERIC_SCALE", "DATETIME_PRECISION", "CHARACTER_SET_NAME", "COLLATION_NAME",
    "DTD_IDENTIFIER", "ROUTINE_BODY", "ROUTINE_DEFINITION", "EXTERNAL_NAME",
    "EXTERNAL_LANGUAGE", "PARAMETER_STYLE", "IS_DETERMINISTIC", "SQL_DATA_ACCESS",
    "SQL_PATH", "SECURITY_TYPE", "CREATED", "LAST_ALTERED", "SQL_MODE", "ROUTINE_COMMENT",
    "DEFINER", "CHARACTER_SET_CLIENT", "COLLATION_CONNECTION", "DATABASE_COLLATION",
];

const TRIGGERS_COLUMNS: &[&str] = &[
    "TRIGGER_CATALOG", "TRIGGER_SCHEMA", "TRIGGER_NAME", "EVENT_MANIPULATION",
    "EVENT_OBJECT_CATALOG", "EVENT_OBJECT_SCHEMA", "EVENT_OBJECT_TABLE", "ACTION_ORDER",
    "ACTION_CONDITION", "ACTION_STATEMENT", "ACTION_ORIENTATION", "ACTION_TIMING",
    "ACTION_REFERENCE_OLD_TABLE", "ACTION_REFERENCE_NEW_TABLE", "ACTION_REFERENCE_OLD_ROW",
    "ACTION_REFERENCE_NEW_ROW", "CREATED", "SQL_MODE", "DEFINER", "CHARACTER_SET_CLIENT",
    "COLLATION_CONNECTION", "DATABASE_COLLATION",
];

const PLUGINS_COLUMNS: &[&str] = &[
    "PLUGIN_NAME", "PLUGIN_VERSION", "PLUGIN_STATUS", "PLUGIN_TYPE", "PLUGIN_TYPE_VERSION",
    "PLUGIN_LIBRARY", "PLUGIN_LIBRARY_VERSION", "PLUGIN_AUTHOR", "PLUGIN_DESCRIPTION",
    "PLUGIN_LICENSE", "LOAD_OPTION", "PLUGIN_MATURITY", "PLUGIN_AUTH_VERSION",
];

const ENGINES_COLUMNS: &[&str] = &[
    "ENGINE", "SUPPORT", "COMMENT", "TRANSACTIONS", "XA", "SAVEPOINTS",
];

const KEY_COLUMN_USAGE_COLUMNS: &[&str] = &[
    "CONSTRAINT_CATALOG", "CONSTRAINT_SCHEMA", "CONSTRAINT_NAME", "TABLE_CATALOG",
    "TABLE_SCHEMA", "TABLE_NAME", "COLUMN_NAME", "ORDINAL_POSITION",
    "POSITION_IN_UNIQUE_CONSTRAINT", "REFERENCED_TABLE_SCHEMA", "REFERENCED_TABLE_NAME",
    "REFERENCED_COLUMN_NAME",
];

const STATISTICS_COLUMNS: &[&str] = &[
    "TABLE_CATALOG", "TABLE_SCHEMA", "TABLE_NAME", "NON_UNIQUE", "INDEX_SCHEMA",
    "INDEX_NAME", "SEQ_IN_INDEX", "COLUMN_NAME", "COLLATION", "CARDINALITY", "SUB_PART",
    "PACKED", "NULLABLE", "INDEX_TYPE", "COMMENT", "INDEX_COMMENT", "IS_VISIBLE",
    "EXPRESSION",
];

const CHARACTER_SETS_COLUMNS: &[&str] = &[
    "CHARACTER_SET_NAME", "DEFAULT_COLLATE_NAME", "DESCRIPTION", "MAXLEN",
];

const COLLATIONS_COLUMNS: &[&str] = &[
    "COLLATION_NAME", "CHARACTER_SET_NAME", "ID", "IS_DEFAULT", "IS_COMPILED", "SORTLEN",
    "PAD_ATTRIBUTE",
];

pub const MODELS_COLUMNS: &[&str] = &[
    "NAME", "ENGINE", "PROJECT", "VERSION", "STATUS", "ACCURACY", "PREDICT",
    "UPDATE_STATUS", "MINDSDB_VERSION", "ERROR", "SELECT_DATA_QUERY", "TRAINING_OPTIONS",
    "CURRENT_TRAINING_PHASE", "TOTAL_TRAINING_PHASES", "TRAINING_PHASE_NAME", "TAG",
    "CREATED_AT", "TRAINING_TIME",
];

const MODELS_VERSIONS_COLUMNS: &[&str] = &[
    "NAME", "ENGINE", "PROJECT", "ACTIVE", "VERSION", "STATUS", "ACCURACY", "PREDICT",
    "UPDATE_STATUS", "MINDSDB_VERSION", "ERROR", "SELECT_DATA_QUERY", "TRAINING_OPTIONS",
    "TAG", "CREATED_AT", "TRAINING_TIME",
];

const DATABASES_COLUMNS: &[&str] = &[
    "NAME", "TYPE", "ENGINE", "CONNECTION_DATA",
];

const ML_ENGINES_COLUMNS: &[&str] = &[
    "NAME", "HANDLER", "CONNECTION_DATA",
];

const HANDLERS_COLUMNS: &[&str] = &[
    "NAME", "TYPE", "TITLE", "DESCRIPTION", "VERSION", "CONNECTION_ARGS", "IMPORT_SUCCESS",
    "IMPORT_ERROR",
];

const JOBS_COLUMNS: &[&str] = &[
    "NAME", "PROJECT", "START_AT", "END_AT", "NEXT_RUN_AT", "SCHEDULE_STR", "QUERY",
    "VARIABLES",
];

const MDB_TRIGGERS_COLUMNS: &[&str] = &[
    "NAME", "PROJECT", "DATABASE", "TABLE", "QUERY", "LAST_ERROR",
];

const JOBS_HISTORY_COLUMNS: &[&str] = &[
    "NAME", "PROJECT", "RUN_START", "RUN_END", "ERROR", "QUERY",
];

const CHATBOTS_COLUMNS: &[&str] = &[
    "NAME", "PROJECT", "DATABASE", "MODEL_NAME", "PARAMS", "IS_RUNNING", "LAST_ERROR",
];

const KNOWLEDGE_BASES_COLUMNS: &[&str] = &[
    "NAME", "PROJECT", "MODEL", "STORAGE",
];

const SKILLS_COLUMNS: &[&str] = &[
    "NAME", "PROJECT", "TYPE", "PARAMS",
];

const AGENTS_COLUMNS: &[&str] = &[
    "NAME", "PROJECT", "MODEL_NAME", "SKILLS", "PARAMS",
];

/// Every virtual table, in catalog order
pub const VIRTUAL_TABLES: &[VirtualTable] = &[
    VirtualTable {
        name: "SCHEMATA",
        columns: SCHEMATA_COLUMNS,
    },
    VirtualTable {
        name: "TABLES",
        columns: TABLES_COLUMNS,
    },
    VirtualTable {
        name: "COLUMNS",
        columns: COLUMNS_COLUMNS,
    },
    VirtualTable {
        name: "EVENTS",
        columns: EVENTS_COLUMNS,
    },
    VirtualTable {
        name: "ROUTINES",
        columns: ROUTINES_COLUMNS,
    },
    VirtualTable {
        name: "TRIGGERS",
        columns: TRIGGERS_COLUMNS,
    },
    VirtualTable {
        name: "PLUGINS",
        columns: PLUGINS_COLUMNS,
    },
    VirtualTable {
        name: "ENGINES",
        columns: ENGINES_COLUMNS,
    },
    VirtualTable {
        name: "KEY_COLUMN_USAGE",
        columns: KEY_COLUMN_USAGE_COLUMNS,
    },
    VirtualTable {
        name: "STATISTICS",
        columns: STATISTICS_COLUMNS,
    },
    VirtualTable {
        name: "CHARACTER_SETS",
        columns: CHARACTER_SETS_COLUMNS,
    },
    VirtualTable {
        name: "COLLATIONS",
        columns: COLLATIONS_COLUMNS,
    },
    VirtualTable {
        name: "MODELS",
        columns: MODELS_COLUMNS,
    },
    VirtualTable {
        name: "MODELS_VERSIONS",
        columns: MODELS_VERSIONS_COLUMNS,
    },
    VirtualTable {
        name: "DATABASES",
        columns: DATABASES_COLUMNS,
    },
    VirtualTable {
        name: "ML_ENGINES",
        columns: ML_ENGINES_COLUMNS,
    },
    VirtualTable {
        name: "HANDLERS",
        columns: HANDLERS_COLUMNS,
    },
    VirtualTable {
        name: "JOBS",
        columns: JOBS_COLUMNS,
    },
    VirtualTable {
        name: "MDB_TRIGGERS",
        columns: MDB_TRIGGERS_COLUMNS,
    },
    VirtualTable {
        name: "JOBS_HISTORY",
        columns: JOBS_HISTORY_COLUMNS,
    },
    VirtualTable {
        name: "CHATBOTS",
        columns: CHATBOTS_COLUMNS,
    },
    VirtualTable {
        name: "KNOWLEDGE_BASES",
        columns: KNOWLEDGE_BASES_COLUMNS,
    },
    VirtualTable {
        name: "SKILLS",
        columns: SKILLS_COLUMNS,
    },
    VirtualTable {
        name: "AGENTS",
        columns: AGENTS_COLUMNS,
    },
];

/// Case-insensitive lookup of a virtual table definition
pub fn lookup(name: &str) -> Option<&'static VirtualTable> {
    VIRTUAL_TABLES
        .iter()
        .find(|table| table.name.eq_ignore_ascii_case(name))
}

/// Ordered column list of a virtual table
pub fn columns_of(name: &str) -> SqlResult<&'static [&'static str]> {
    lookup(name)
        .map(|table| table.columns)
        .ok_or_else(|| SqlApiError::TableNotFound(format!("Table information_schema.{} does not exists", name)))
}

pub fn table_exists(name: &str) -> bool {
    lookup(name).is_some()
}

pub fn table_names() -> impl Iterator<Item = &'static str> {
    VIRTUAL_TABLES.iter().map(|table| table.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_table_has_columns() {
        assert_eq!(VIRTUAL_TABLES.len(), 24);
        for table in VIRTUAL_TABLES {
            assert!(!table.columns.is_empty(), "{} has no columns", table.name);
            let unique: HashSet<_> = table.columns.iter().collect();
            assert_eq!(unique.len(), table.columns.len(), "{} repeats a column", table.name);
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(columns_of("models").unwrap()[0], "NAME");
        assert!(table_exists("Jobs_History"));
        assert!(!table_exists("predictors"));
        assert!(matches!(columns_of("nope"), Err(SqlApiError::TableNotFound(_))));
    }

    #[test]
    fn test_compatibility_column_orders() {
        assert_eq!(
            columns_of("DATABASES").unwrap(),
            &["NAME", "TYPE", "ENGINE", "CONNECTION_DATA"]
        );
        assert_eq!(
            columns_of("JOBS").unwrap(),
            &["NAME", "PROJECT", "START_AT", "END_AT", "NEXT_RUN_AT", "SCHEDULE_STR", "QUERY", "VARIABLES"]
        );
        assert_eq!(columns_of("TABLES").unwrap().len(), 21);
        assert_eq!(columns_of("MODELS").unwrap().len(), 18);
        assert_eq!(columns_of("MODELS_VERSIONS").unwrap()[3], "ACTIVE");
    }
}
