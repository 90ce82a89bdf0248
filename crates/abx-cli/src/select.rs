//! Account selection shared by every subcommand.

use abx_core::accounts::{self, Account, Credentials};

/// Resolves the `--account` selection. Explicit ids must all resolve to
/// registered accounts with credentials; an empty selection means every
/// account that has a credential pair in the environment.
pub(crate) fn selected_accounts(filter: &[String]) -> anyhow::Result<Vec<(Account, Credentials)>> {
    if filter.is_empty() {
        return Ok(accounts::load_credentials_from_env()?);
    }
    let mut selected = Vec::new();
    for id in filter {
        let pair =
            accounts::credentials_for(id).map_err(|err| anyhow::anyhow!("account {id}: {err}"))?;
        selected.push(pair);
    }
    Ok(selected)
}

/// Turns per-account outcomes into the process result. A partial run is
/// still a success; only losing every selected account is not.
pub(crate) fn finish(total: usize, failed: usize) -> anyhow::Result<()> {
    if total > 0 && failed == total {
        anyhow::bail!("all {total} selected accounts failed");
    }
    Ok(())
}
