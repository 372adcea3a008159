pub mod check;
pub mod compare;
pub mod simulate;

use crate::error::{CliError, Result};
use gatebench::validation::verdict::Verdict;

/// Prints each verdict and fails when any of them did.
pub fn report(verdicts: &[Verdict]) -> Result<()> {
    for verdict in verdicts {
        print!("{verdict}");
    }
    let failed = verdicts.iter().filter(|v| !v.ok()).count();
    if failed > 0 {
        return Err(CliError::ChecksFailed {
            failed,
            total: verdicts.len(),
        });
    }
    Ok(())
}
