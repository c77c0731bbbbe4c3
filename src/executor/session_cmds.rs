// SET and USE

use tracing::{debug, warn};

use super::{expr_value, is_truthy, ExecuteCommands};
use crate::error::{SqlApiError, SqlResult};
use crate::models::{charset, ExecuteAnswer};
use crate::sql::{Set, Use};

impl ExecuteCommands<'_> {
    /// Apply a SET statement to the session
    ///
    /// Only `profiling`, `predictor_cache` and `names` change state. Every
    /// other form is acknowledged so that client probing does not fail.
    pub(super) fn answer_set(&mut self, set: &Set) -> SqlResult<ExecuteAnswer> {
        let category = set.category.as_deref().unwrap_or_default().to_lowercase();
        let value = set.arg.as_ref().and_then(expr_value);

        match category.as_str() {
            "profiling" => {
                self.session.profiling = value.as_ref().is_some_and(is_truthy);
                Ok(ExecuteAnswer::ok())
            }
            "predictor_cache" => {
                self.session.predictor_cache = value.as_ref().is_some_and(is_truthy);
                Ok(ExecuteAnswer::ok())
            }
            "names" => {
                let name = value
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .map(str::to_lowercase)
                    .unwrap_or_else(|| "utf8".to_string());

                match charset::for_names(&name) {
                    Some(text_type) => self.session.charset_text_type = text_type,
                    None => warn!(charset = %name, "Unknown charset, keeping column type unchanged"),
                }
                self.session.charset = name.clone();

                Ok(ExecuteAnswer::ok().with_state_track(vec![
                    ("character_set_client".to_string(), name.clone()),
                    ("character_set_connection".to_string(), name.clone()),
                    ("character_set_results".to_string(), name),
                ]))
            }
            "autocommit" | "transaction" => {
                debug!(category = %category, "SET acknowledged as no-op");
                Ok(ExecuteAnswer::ok())
            }
            _ => {
                warn!(category = %category, arg = ?set.arg, "Unsupported SET form, answering OK");
                Ok(ExecuteAnswer::ok())
            }
        }
    }

    pub(super) async fn answer_use(&mut self, statement: &Use) -> SqlResult<ExecuteAnswer> {
        let name = statement.value.last();

        // Some drivers send `USE null` on connect
        if name.eq_ignore_ascii_case("null") {
            return Ok(ExecuteAnswer::ok());
        }

        if !self.session.datahub().database_exists(name).await? {
            return Err(SqlApiError::BadDb(format!("Database {} does not exists", name)));
        }

        self.session.database = name.to_string();
        Ok(ExecuteAnswer::ok())
    }
}
