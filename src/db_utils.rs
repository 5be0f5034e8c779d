use crate::config::Config;
use crate::error::{PipelineError, Result};
use colored::*;
use duckdb::{Connection, Transaction};
use once_cell::sync::Lazy;
use std::sync::Mutex;

static IS_CONNECTION_MSG_LOGGED: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(false));

pub fn get_connection(config: &Config) -> Result<Connection> {
    let mut is_connection_msg_logged = IS_CONNECTION_MSG_LOGGED.lock().unwrap();
    if !*is_connection_msg_logged {
        println!(
            "{} {}",
            "🔌 Connecting to DuckDB at:".bright_black(),
            config.database_path.display()
        );
        *is_connection_msg_logged = true;
    }
    Connection::open(&config.database_path).map_err(|e| PipelineError::Fatal {
        context: "db_utils::get_connection".to_string(),
        detail: e.to_string(),
    })
}

/// Opens a connection, runs `f`, drops the connection. Mirrors the teacher's
/// `with_connection` helper, generalized to propagate errors instead of
/// panicking (§7: a DB open failure is Fatal, but a query failure inside
/// `f` should reach the caller as a typed error, not abort the process).
pub fn with_connection<F, R>(config: &Config, context: &'static str, f: F) -> Result<R>
where
    F: FnOnce(&Connection) -> Result<R>,
{
    let conn = get_connection(config)?;
    f(&conn).map_err(|e| wrap_context(context, e))
}

pub fn with_transaction<F, R>(config: &Config, context: &'static str, f: F) -> Result<R>
where
    F: FnOnce(&Transaction) -> Result<R>,
{
    let mut conn = get_connection(config)?;
    let tx = conn.transaction().map_err(|e| PipelineError::Fatal {
        context: context.to_string(),
        detail: format!("failed to start transaction: {e}"),
    })?;
    let result = f(&tx).map_err(|e| wrap_context(context, e))?;
    tx.commit().map_err(|e| PipelineError::Fatal {
        context: context.to_string(),
        detail: format!("failed to commit transaction: {e}"),
    })?;
    Ok(result)
}

fn wrap_context(context: &'static str, err: PipelineError) -> PipelineError {
    match err {
        PipelineError::Fatal { detail, .. } => PipelineError::Fatal {
            context: context.to_string(),
            detail,
        },
        other => other,
    }
}
