//! Owner identity and process name resolution
//!
//! `IdentityResolver` is the seam to the host's identity lookup. Both calls may
//! block; the correlator runs them off the event intake path.

use crate::constants::{NOT_AVAILABLE, PROCESS_NAME_ERROR, SID_ERROR, SID_NOT_FOUND, SID_PROCESS_NOT_FOUND};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

/// Failure modes of an owner lookup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("process not found")]
    ProcessNotFound,
    #[error("owner sid not found")]
    SidNotFound,
    #[error("query failed: {0}")]
    Query(String),
}

impl ResolveError {
    /// Sid value recorded in place of a real identity
    pub fn sid_sentinel(&self) -> &'static str {
        match self {
            ResolveError::ProcessNotFound => SID_PROCESS_NOT_FOUND,
            ResolveError::SidNotFound => SID_NOT_FOUND,
            ResolveError::Query(_) => SID_ERROR,
        }
    }
}

/// Host identity lookup
pub trait IdentityResolver: Send + Sync + 'static {
    /// Security identifier of the account owning `process_id`
    fn resolve_owner_sid(&self, process_id: u32) -> Result<String, ResolveError>;

    /// Name of `process_id`, `None` if no such process exists
    fn resolve_process_name(&self, process_id: u32) -> Result<Option<String>, ResolveError>;
}

/// Resolve the owner sid, substituting the matching sentinel on failure
pub fn owner_sid_or_sentinel(resolver: &dyn IdentityResolver, process_id: u32) -> String {
    match resolver.resolve_owner_sid(process_id) {
        Ok(sid) => sid,
        Err(e) => {
            match &e {
                ResolveError::ProcessNotFound => {
                    log::error!("Process with ID {} not found.", process_id)
                }
                _ => log::error!("Error getting SID for process {}: {}", process_id, e),
            }
            e.sid_sentinel().to_string()
        }
    }
}

/// Best-effort name lookup for a parent process
pub fn process_name_or_placeholder(resolver: &dyn IdentityResolver, process_id: u32) -> String {
    if process_id == 0 {
        return NOT_AVAILABLE.to_string();
    }
    match resolver.resolve_process_name(process_id) {
        Ok(Some(name)) => name,
        Ok(None) => NOT_AVAILABLE.to_string(),
        Err(e) => {
            log::warn!("Process name query failed for PID {}: {}", process_id, e);
            PROCESS_NAME_ERROR.to_string()
        }
    }
}

/// Resolver backed by the local process table.
///
/// Every lookup refreshes its own `System` holding only the requested pid,
/// so concurrent lookups never wait on each other.
#[derive(Debug, Clone, Copy)]
pub struct SystemIdentityResolver;

impl SystemIdentityResolver {
    pub fn new() -> Self {
        Self
    }

    /// Refresh a single pid and run `f` against it
    fn with_process<T>(
        &self,
        process_id: u32,
        refresh: ProcessRefreshKind,
        f: impl FnOnce(&sysinfo::Process) -> T,
    ) -> Option<T> {
        let mut system = System::new();
        let pid = Pid::from_u32(process_id);
        system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, refresh);
        system.process(pid).map(f)
    }
}

impl Default for SystemIdentityResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityResolver for SystemIdentityResolver {
    fn resolve_owner_sid(&self, process_id: u32) -> Result<String, ResolveError> {
        let refresh = ProcessRefreshKind::new().with_user(UpdateKind::Always);
        self.with_process(process_id, refresh, |process| {
            // Numeric uid on Unix, SID string on Windows
            process.user_id().map(|uid| (**uid).to_string())
        })
        .ok_or(ResolveError::ProcessNotFound)?
        .ok_or(ResolveError::SidNotFound)
    }

    fn resolve_process_name(&self, process_id: u32) -> Result<Option<String>, ResolveError> {
        Ok(self.with_process(process_id, ProcessRefreshKind::new(), |process| {
            process.name().to_string_lossy().to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResolver {
        sid: Result<String, ResolveError>,
        name: Result<Option<String>, ResolveError>,
    }

    impl IdentityResolver for FixedResolver {
        fn resolve_owner_sid(&self, _process_id: u32) -> Result<String, ResolveError> {
            self.sid.clone()
        }

        fn resolve_process_name(&self, _process_id: u32) -> Result<Option<String>, ResolveError> {
            self.name.clone()
        }
    }

    fn resolver(
        sid: Result<String, ResolveError>,
        name: Result<Option<String>, ResolveError>,
    ) -> FixedResolver {
        FixedResolver { sid, name }
    }

    #[test]
    fn test_sentinels_per_failure_mode() {
        assert_eq!(ResolveError::ProcessNotFound.sid_sentinel(), "UNKNOWN_PROCESS_NOT_FOUND");
        assert_eq!(ResolveError::SidNotFound.sid_sentinel(), "UNKNOWN_SID_NOT_FOUND");
        assert_eq!(ResolveError::Query("boom".into()).sid_sentinel(), "ERROR_GETTING_SID");
    }

    #[test]
    fn test_owner_sid_or_sentinel() {
        let ok = resolver(Ok("S-1-5-18".into()), Ok(None));
        assert_eq!(owner_sid_or_sentinel(&ok, 1), "S-1-5-18");

        let gone = resolver(Err(ResolveError::ProcessNotFound), Ok(None));
        assert_eq!(owner_sid_or_sentinel(&gone, 1), SID_PROCESS_NOT_FOUND);

        let failed = resolver(Err(ResolveError::Query("denied".into())), Ok(None));
        assert_eq!(owner_sid_or_sentinel(&failed, 1), SID_ERROR);
    }

    #[test]
    fn test_process_name_placeholders() {
        let named = resolver(Ok(String::new()), Ok(Some("explorer.exe".into())));
        assert_eq!(process_name_or_placeholder(&named, 4), "explorer.exe");
        assert_eq!(process_name_or_placeholder(&named, 0), NOT_AVAILABLE);

        let missing = resolver(Ok(String::new()), Ok(None));
        assert_eq!(process_name_or_placeholder(&missing, 4), NOT_AVAILABLE);

        let failed = resolver(Ok(String::new()), Err(ResolveError::Query("timeout".into())));
        assert_eq!(process_name_or_placeholder(&failed, 4), PROCESS_NAME_ERROR);
    }

    #[test]
    fn test_system_resolver_finds_current_process() {
        let resolver = SystemIdentityResolver::new();
        let name = resolver.resolve_process_name(std::process::id()).unwrap();
        assert!(name.is_some(), "current process should be resolvable by name");
    }

    #[test]
    fn test_system_resolver_concurrent_lookups() {
        let resolver = std::sync::Arc::new(SystemIdentityResolver::new());
        let pid = std::process::id();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = std::sync::Arc::clone(&resolver);
                std::thread::spawn(move || resolver.resolve_process_name(pid))
            })
            .collect();

        for handle in handles {
            assert!(matches!(handle.join().unwrap(), Ok(Some(_))));
        }
    }

    #[test]
    fn test_system_resolver_missing_process() {
        let resolver = SystemIdentityResolver::new();
        // PIDs this large are not handed out on any supported platform
        let pid = u32::MAX - 1;
        assert_eq!(resolver.resolve_owner_sid(pid), Err(ResolveError::ProcessNotFound));
        assert_eq!(resolver.resolve_process_name(pid), Ok(None));
    }
}
