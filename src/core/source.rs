//! Access to the live firewall
//!
//! [`RuleSource`] is the seam between the cleanup engine and ufw. The
//! production implementation, [`UfwCli`], shells out to the ufw binary; tests
//! use an in-memory store that renumbers rules the way ufw does.

use crate::core::error::AdapterError;
use crate::core::rule::Family;
use crate::elevation::Launcher;
use tracing::{debug, info, warn};

/// Operations the cleanup engine needs from the firewall
///
/// Both calls are awaited to completion before the engine continues.
#[allow(async_fn_in_trait)]
pub trait RuleSource {
    /// Returns the raw numbered listing that contains `family`'s rules
    async fn list_rules(&self, family: Family) -> Result<String, AdapterError>;

    /// Deletes the rule currently at `number`
    ///
    /// With `confirm` set the operator is asked first; `false` suppresses
    /// any prompt.
    async fn delete_rule(
        &self,
        family: Family,
        number: u32,
        confirm: bool,
    ) -> Result<(), AdapterError>;
}

/// Operator confirmation hook: returns true to go ahead with the deletion
pub type ConfirmFn = Box<dyn Fn(Family, u32) -> bool>;

/// [`RuleSource`] backed by the ufw command-line tool
pub struct UfwCli {
    program: String,
    launcher: Launcher,
    confirm: Option<ConfirmFn>,
}

impl UfwCli {
    /// Creates a source running `program` through `launcher`
    ///
    /// # Errors
    ///
    /// Returns `Err` if `program` is not an acceptable path to hand to an
    /// elevated command.
    pub fn new(program: impl Into<String>, launcher: Launcher) -> Result<Self, AdapterError> {
        let program = program.into();
        crate::validators::validate_program_path(&program)
            .map_err(AdapterError::InvalidArgument)?;

        Ok(Self {
            program,
            launcher,
            confirm: None,
        })
    }

    /// Installs the hook used when a deletion needs confirmation
    pub fn with_confirmation(mut self, confirm: ConfirmFn) -> Self {
        self.confirm = Some(confirm);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn launcher(&self) -> Launcher {
        self.launcher
    }

    async fn run(&self, args: &[&str]) -> Result<String, AdapterError> {
        debug!(
            "Running {} {} (launcher: {})",
            self.program,
            args.join(" "),
            self.launcher
        );

        let output = self
            .launcher
            .command(&self.program, args)
            .output()
            .await
            .map_err(|source| AdapterError::Spawn {
                program: self
                    .launcher
                    .wrapper()
                    .map_or_else(|| self.program.clone(), str::to_string),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(AdapterError::NonZeroExit {
                exit_code: output.status.code(),
                stderr,
            });
        }

        String::from_utf8(output.stdout).map_err(|_| AdapterError::InvalidOutput)
    }
}

impl RuleSource for UfwCli {
    async fn list_rules(&self, family: Family) -> Result<String, AdapterError> {
        debug!("Listing rules for {family}");
        self.run(&["status", "numbered"]).await
    }

    async fn delete_rule(
        &self,
        family: Family,
        number: u32,
        confirm: bool,
    ) -> Result<(), AdapterError> {
        crate::validators::validate_rule_number(number).map_err(AdapterError::InvalidArgument)?;

        if confirm {
            let approved = match &self.confirm {
                Some(hook) => hook(family, number),
                None => {
                    warn!("No way to confirm deletion of {family} rule #{number}; skipping");
                    false
                }
            };
            if !approved {
                return Err(AdapterError::Declined { family, number });
            }
        }

        let number_arg = number.to_string();
        let stdout = self.run(&["--force", "delete", &number_arg]).await?;
        info!("ufw: {}", stdout.trim());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_relative_program() {
        let result = UfwCli::new("ufw", Launcher::Direct);
        assert!(matches!(result, Err(AdapterError::InvalidArgument(_))));
    }

    #[test]
    fn test_accepts_absolute_program() {
        let ufw = UfwCli::new("/usr/sbin/ufw", Launcher::Sudo).unwrap();
        assert_eq!(ufw.program(), "/usr/sbin/ufw");
        assert_eq!(ufw.launcher(), Launcher::Sudo);
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let ufw = UfwCli::new("/nonexistent/cufw-test/ufw", Launcher::Direct).unwrap();
        let result = ufw.list_rules(Family::Ipv4).await;
        assert!(matches!(result, Err(AdapterError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_declined_without_hook() {
        let ufw = UfwCli::new("/nonexistent/cufw-test/ufw", Launcher::Direct).unwrap();
        let result = ufw.delete_rule(Family::Ipv4, 3, true).await;
        assert!(matches!(
            result,
            Err(AdapterError::Declined {
                family: Family::Ipv4,
                number: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_declined_by_hook() {
        let ufw = UfwCli::new("/nonexistent/cufw-test/ufw", Launcher::Direct)
            .unwrap()
            .with_confirmation(Box::new(|_, number| number != 7));
        let result = ufw.delete_rule(Family::Ipv6, 7, true).await;
        assert!(matches!(result, Err(AdapterError::Declined { .. })));
    }

    #[tokio::test]
    async fn test_zero_rule_number_rejected() {
        let ufw = UfwCli::new("/nonexistent/cufw-test/ufw", Launcher::Direct).unwrap();
        let result = ufw.delete_rule(Family::Ipv4, 0, false).await;
        assert!(matches!(result, Err(AdapterError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let ufw = UfwCli::new("/bin/false", Launcher::Direct).unwrap();
        let result = ufw.list_rules(Family::Ipv4).await;
        assert!(matches!(result, Err(AdapterError::NonZeroExit { .. })));
    }
}
