// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use amtrak_board::auth::accounts::{
    Account, AccountFilters, hash_password, read_accounts, write_accounts,
};
use amtrak_board::schedule_filtering::Region;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Adds or replaces a board login in the accounts file.
#[derive(Parser)]
struct Flags {
    #[clap(long, env = "ACCOUNTS_FILE", default_value = "accounts.json")]
    accounts: PathBuf,
    #[clap(long)]
    username: String,
    #[clap(long)]
    password: String,
    /// Comma separated route patterns, e.g. "/rt/*,/data/*"
    #[clap(long, default_value = "*")]
    routes: String,
    #[clap(long)]
    region: Option<Region>,
    /// Remove the user instead
    #[clap(long)]
    delete: bool,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let flags: Flags = Flags::parse();

    let username = flags.username.trim().to_string();
    anyhow::ensure!(!username.is_empty(), "username cannot be blank");

    let mut accounts = read_accounts(&flags.accounts)?;

    if flags.delete {
        match accounts.remove(&username) {
            Some(_) => info!("Removed {}", username),
            None => info!("{} was not in {}", username, flags.accounts.display()),
        }
    } else {
        anyhow::ensure!(!flags.password.is_empty(), "password cannot be blank");

        let routes: Vec<String> = flags
            .routes
            .split(',')
            .map(str::trim)
            .filter(|route| !route.is_empty())
            .map(str::to_string)
            .collect();

        let account = Account {
            hash: hash_password(&flags.password)?,
            routes,
            filters: AccountFilters {
                region: flags.region.map(|region| region.tag().to_string()),
            },
        };

        let replaced = accounts.insert(username.clone(), account).is_some();
        info!(
            "{} {} in {}",
            if replaced { "Updated" } else { "Added" },
            username,
            flags.accounts.display()
        );
    }

    write_accounts(&flags.accounts, &accounts)?;

    Ok(())
}
