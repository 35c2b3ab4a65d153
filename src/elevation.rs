//! Privilege elevation for ufw invocations
//!
//! ufw refuses to list or delete rules unless it runs as root. cufw can be
//! started as an unprivileged user; in that case every ufw call is wrapped in
//! an elevation tool. The choice is made once, by [`resolve_launcher`], and
//! the resulting [`Launcher`] is handed to the rule source explicitly.
//!
//! # Elevation Strategy
//!
//! - **Already root**: run ufw directly
//! - **Preferred**: `run0` when available (systemd v256+, no SUID)
//! - **Terminal fallback**: `sudo`
//! - **No terminal**: `pkexec` for graphical authentication
//!
//! # Environment Variables
//!
//! - `CUFW_ELEVATION_METHOD`: Force a specific elevation method (`sudo`, `run0`, or `pkexec`).
//!   Useful with sudoers NOPASSWD rules, e.g. from a systemd timer.
//!   Example: `CUFW_ELEVATION_METHOD=sudo cufw --yes`
//!
//! - `CUFW_TEST_NO_ELEVATION`: Bypass elevation entirely (for testing only).
//!
//! # Security
//!
//! - Only the configured ufw binary is run through the launcher
//! - Arguments are validated before elevation (see [`crate::validators`])
//! - Commands are constructed without shell interpolation
//!
//! # Example
//!
//! ```no_run
//! use cufw::elevation::resolve_launcher;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let launcher = resolve_launcher()?;
//! let output = launcher
//!     .command("/usr/sbin/ufw", &["status", "numbered"])
//!     .output()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::io;
use tokio::process::Command;

/// Error type for privilege elevation operations
#[derive(Debug, thiserror::Error)]
pub enum ElevationError {
    /// pkexec binary not found in PATH
    #[error("pkexec not found - please install PolicyKit or run cufw as root")]
    PkexecNotFound,

    /// Requested elevation method is not available (binary not found)
    #[error("Elevation method '{0}' is not available (binary not found)")]
    MethodNotAvailable(String),

    /// Invalid value for `CUFW_ELEVATION_METHOD`
    #[error("Invalid CUFW_ELEVATION_METHOD '{0}'. Valid options: sudo, run0, pkexec")]
    InvalidMethod(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// How ufw gets run with root rights
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Launcher {
    /// Run the program as-is (already root, or tests)
    Direct,
    Sudo,
    Run0,
    Pkexec,
}

impl Launcher {
    /// Name of the wrapper binary, if any
    pub const fn wrapper(self) -> Option<&'static str> {
        match self {
            Launcher::Direct => None,
            Launcher::Sudo => Some("sudo"),
            Launcher::Run0 => Some("run0"),
            Launcher::Pkexec => Some("pkexec"),
        }
    }

    /// Builds a command running `program` with `args` through this launcher
    ///
    /// Arguments are passed directly without shell interpretation.
    /// Callers must validate them first.
    pub fn command(self, program: &str, args: &[&str]) -> Command {
        match self.wrapper() {
            Some(wrapper) => {
                let mut cmd = Command::new(wrapper);
                cmd.arg(program).args(args);
                cmd
            }
            None => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
        }
    }
}

/// Checks if a binary exists in PATH
fn binary_exists(name: &str) -> bool {
    std::env::var_os("PATH")
        .and_then(|paths| {
            std::env::split_paths(&paths).find_map(|dir| {
                let full_path = dir.join(name);
                if full_path.is_file() {
                    Some(full_path)
                } else {
                    None
                }
            })
        })
        .is_some()
}

/// Returns true when the process already runs as root
pub fn is_root() -> bool {
    nix::unistd::getuid().is_root()
}

/// Decides once how ufw will be run for the rest of the process
///
/// # Errors
///
/// Returns `Err` if `CUFW_ELEVATION_METHOD` is invalid or names a missing
/// binary, or if no elevation tool is usable.
pub fn resolve_launcher() -> Result<Launcher, ElevationError> {
    use std::os::fd::AsFd;

    // 1. Strict Test Mode Override (Highest Priority)
    if std::env::var("CUFW_TEST_NO_ELEVATION").is_ok() {
        return Ok(Launcher::Direct);
    }

    // 2. Direct Root Execution (No prompt needed)
    if is_root() {
        return Ok(Launcher::Direct);
    }

    // 3. Explicit elevation method override
    if let Ok(method) = std::env::var("CUFW_ELEVATION_METHOD")
        && !method.is_empty()
    {
        let launcher = match method.parse::<Launcher>() {
            Ok(Launcher::Direct) | Err(_) => {
                return Err(ElevationError::InvalidMethod(method.to_lowercase()));
            }
            Ok(launcher) => launcher,
        };
        let wrapper = launcher.wrapper().unwrap_or_default();
        if !binary_exists(wrapper) {
            return Err(ElevationError::MethodNotAvailable(wrapper.into()));
        }
        return Ok(launcher);
    }

    // 4. Automatic detection - prefer run0 (modern, no SUID), fallback to sudo/pkexec
    if binary_exists("run0") {
        return Ok(Launcher::Run0);
    }

    let is_atty = nix::unistd::isatty(std::io::stdin().as_fd()).unwrap_or(false);

    if is_atty {
        Ok(Launcher::Sudo)
    } else if binary_exists("pkexec") {
        Ok(Launcher::Pkexec)
    } else {
        Err(ElevationError::PkexecNotFound)
    }
}
