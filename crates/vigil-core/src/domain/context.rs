//! ExecutionContext - backend 呼び出しに渡す明示的な実行コンテキスト
//!
//! status check の実装は search path や環境変数、作業ディレクトリを書き換えることがあります。
//! それらをプロセス全体の暗黙の状態にせず、この値に閉じ込めて `&mut` で backend に渡し、
//! ワーカーが次の command の前に baseline へ戻します。
//! watchdog はこの状態について何も知りません。

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::errors::ContextError;

/// Snapshot of the ambient state a check may depend on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextState {
    pub search_path: Vec<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    baseline: ContextState,
    current: ContextState,
    poisoned: Option<String>,
}

impl ExecutionContext {
    pub fn new(baseline: ContextState) -> Self {
        Self {
            current: baseline.clone(),
            baseline,
            poisoned: None,
        }
    }

    pub fn baseline(&self) -> &ContextState {
        &self.baseline
    }

    pub fn current(&self) -> &ContextState {
        &self.current
    }

    pub fn push_search_path(&mut self, path: impl Into<PathBuf>) {
        self.current.search_path.push(path.into());
    }

    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.current.env.insert(key.into(), value.into());
    }

    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) {
        self.current.working_dir = Some(dir.into());
    }

    /// Has a check changed anything since the last revert?
    pub fn is_dirty(&self) -> bool {
        self.current != self.baseline
    }

    /// Mark the context as holding state that cannot be reverted.
    ///
    /// A backend calls this when it touched something outside the snapshot
    /// (e.g. loaded a module it cannot unload). The next revert fails.
    pub fn poison(&mut self, reason: impl Into<String>) {
        self.poisoned = Some(reason.into());
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Restore the baseline.
    ///
    /// Returns whether anything had to be reverted. A poisoned context stays
    /// poisoned; the caller is expected to stop serving commands.
    pub fn revert(&mut self) -> Result<bool, ContextError> {
        if let Some(reason) = &self.poisoned {
            return Err(ContextError::Poisoned(reason.clone()));
        }
        let dirty = self.is_dirty();
        if dirty {
            self.current = self.baseline.clone();
        }
        Ok(dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> ContextState {
        ContextState {
            search_path: vec![PathBuf::from("/usr/lib/agent")],
            env: BTreeMap::from([("LANG".to_string(), "C".to_string())]),
            working_dir: None,
        }
    }

    #[test]
    fn fresh_context_is_clean() {
        let mut ctx = ExecutionContext::new(baseline());
        assert!(!ctx.is_dirty());
        assert!(!ctx.revert().unwrap());
    }

    #[test]
    fn revert_restores_baseline() {
        let mut ctx = ExecutionContext::new(baseline());
        ctx.push_search_path("/var/lib/stacks/HDFS/scripts");
        ctx.set_env("JAVA_HOME", "/usr/jdk64");
        ctx.set_working_dir("/tmp/check");
        assert!(ctx.is_dirty());

        assert!(ctx.revert().unwrap());
        assert_eq!(ctx.current(), &baseline());
    }

    #[test]
    fn poisoned_context_refuses_to_revert() {
        let mut ctx = ExecutionContext::new(baseline());
        ctx.poison("native module loaded");

        let err = ctx.revert().unwrap_err();
        assert!(matches!(err, ContextError::Poisoned(ref r) if r == "native module loaded"));
        assert!(ctx.is_poisoned());
    }
}
