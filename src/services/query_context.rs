// Scoped execution contexts
//
// A nested query (view body, view validation) runs under a context tag that
// is pushed before execution and popped when the guard drops, on every exit
// path. The last queries executed outside an `Ignore` context are kept per
// session.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::error::{SqlApiError, SqlResult};

/// Number of executed queries a session keeps
pub const RECENT_QUERIES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    /// Executing a stored view body
    View,
    /// Executing a throwaway query that must not leave traces
    Ignore,
}

impl ContextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKind::View => "view",
            ContextKind::Ignore => "ignore",
        }
    }
}

#[derive(Debug, Default)]
pub struct QueryContextController {
    stack: Mutex<Vec<(ContextKind, String)>>,
    recent: Mutex<VecDeque<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl QueryContextController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Push a context; it is popped when the returned guard drops
    ///
    /// Entering a view that is already being executed is rejected, which stops
    /// self-referencing view definitions.
    pub fn acquire(self: &Arc<Self>, kind: ContextKind, id: impl Into<String>) -> SqlResult<ContextGuard> {
        let id = id.into();
        let mut stack = lock(&self.stack);
        if kind == ContextKind::View && stack.iter().any(|(k, i)| *k == kind && *i == id) {
            return Err(SqlApiError::SqlApi(format!("Recursive call of view: {}", id)));
        }
        debug!(kind = kind.as_str(), id = %id, depth = stack.len(), "Acquire query context");
        stack.push((kind, id.clone()));
        Ok(ContextGuard {
            controller: Arc::clone(self),
            kind,
            id,
        })
    }

    fn release(&self, kind: ContextKind, id: &str) {
        let mut stack = lock(&self.stack);
        if let Some(pos) = stack.iter().rposition(|(k, i)| *k == kind && i == id) {
            stack.remove(pos);
        }
        debug!(kind = kind.as_str(), id = %id, depth = stack.len(), "Release query context");
    }

    /// Innermost active context
    pub fn current(&self) -> Option<(ContextKind, String)> {
        lock(&self.stack).last().cloned()
    }

    pub fn depth(&self) -> usize {
        lock(&self.stack).len()
    }

    pub fn is_ignored(&self) -> bool {
        lock(&self.stack).iter().any(|(k, _)| *k == ContextKind::Ignore)
    }

    /// Remember an executed query unless an `Ignore` context is active
    pub fn record_query(&self, sql: &str) {
        if self.is_ignored() {
            return;
        }
        let mut recent = lock(&self.recent);
        if recent.len() == RECENT_QUERIES {
            recent.pop_front();
        }
        recent.push_back(sql.to_string());
    }

    /// Recorded queries, oldest first
    pub fn recorded(&self) -> Vec<String> {
        lock(&self.recent).iter().cloned().collect()
    }
}

/// Releases its context on drop
pub struct ContextGuard {
    controller: Arc<QueryContextController>,
    kind: ContextKind,
    id: String,
}

impl ContextGuard {
    pub fn kind(&self) -> ContextKind {
        self.kind
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.controller.release(self.kind, &self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_releases_on_drop() {
        let contexts = QueryContextController::new();
        {
            let _outer = contexts.acquire(ContextKind::View, "v1").unwrap();
            let _inner = contexts.acquire(ContextKind::View, "v2").unwrap();
            assert_eq!(contexts.depth(), 2);
            assert_eq!(contexts.current(), Some((ContextKind::View, "v2".to_string())));
        }
        assert_eq!(contexts.depth(), 0);
    }

    #[test]
    fn test_guard_releases_on_error_path() {
        fn failing(contexts: &Arc<QueryContextController>) -> SqlResult<()> {
            let _guard = contexts.acquire(ContextKind::View, "v1")?;
            Err(SqlApiError::SqlApi("boom".to_string()))
        }
        let contexts = QueryContextController::new();
        assert!(failing(&contexts).is_err());
        assert_eq!(contexts.depth(), 0);
    }

    #[test]
    fn test_recursive_view_is_rejected() {
        let contexts = QueryContextController::new();
        let _guard = contexts.acquire(ContextKind::View, "v1").unwrap();
        assert!(contexts.acquire(ContextKind::View, "v1").is_err());
        assert_eq!(contexts.depth(), 1);
    }

    #[test]
    fn test_ignore_context_skips_recording() {
        let contexts = QueryContextController::new();
        contexts.record_query("select 1");
        {
            let _guard = contexts.acquire(ContextKind::Ignore, "validation").unwrap();
            contexts.record_query("select 2");
        }
        contexts.record_query("select 3");
        assert_eq!(contexts.recorded(), vec!["select 1", "select 3"]);
    }

    #[test]
    fn test_recording_keeps_latest_queries() {
        let contexts = QueryContextController::new();
        for i in 0..RECENT_QUERIES + 5 {
            contexts.record_query(&format!("select {}", i));
        }
        let recorded = contexts.recorded();
        assert_eq!(recorded.len(), RECENT_QUERIES);
        assert_eq!(recorded[0], "select 5");
        assert_eq!(recorded.last(), Some(&format!("select {}", RECENT_QUERIES + 4)));
    }
}
