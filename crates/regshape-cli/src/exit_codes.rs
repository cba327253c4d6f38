//! Process exit codes.
//! Engine failures map through `AuthError::exit_code` so scripts can tell a
//! misconfigured registry (3), rejected credentials (4), an unreachable
//! server (5) and a broken credential helper (6) apart.

use regshape_auth::AuthError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1; // Anything that is not an engine error

/// Exit code for an error returned by a command.
pub fn for_error(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<AuthError>())
        .map(AuthError::exit_code)
        .unwrap_or(FAILURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_auth_error_code_survives_context() {
        let err: anyhow::Result<()> = Err(AuthError::MissingRealm).context("login failed");
        assert_eq!(for_error(&err.unwrap_err()), 3);
    }

    #[test]
    fn test_other_errors_are_failure() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(for_error(&err), FAILURE);
    }
}
