//! Remote account generation command.

use cachelogin::generator::{self, GeneratorClient};
use cachelogin::{token, AccountStore, AppConfig, Error, Result};
use clap::Args;

/// Characters of an unparseable response echoed back to the user.
const PREVIEW_LEN: usize = 200;

/// Generate an account through the remote service and save it
#[derive(Args, Debug)]
pub struct GenerateCmd {
    /// Account type to request.
    #[arg(long, default_value = "cs2_prime")]
    pub kind: String,

    /// Number of accounts to request.
    #[arg(long, default_value_t = 1)]
    pub amount: u32,

    /// Server-side check level.
    #[arg(long, default_value = "full")]
    pub precheck: String,
}

impl GenerateCmd {
    pub fn run(self, config: &AppConfig) -> Result<()> {
        let client = GeneratorClient::new(&config.generator)?;
        let raw = client.generate(&self.kind, self.amount, &self.precheck)?;

        let entry = generator::extract_account(&raw).ok_or_else(|| {
            let preview: String = raw.chars().take(PREVIEW_LEN).collect();
            Error::Generator(format!("could not parse account from response: {}", preview))
        })?;

        let steam_id = token::decode_subject(&entry.token)?;
        let store = AccountStore::open_default(config)?;
        if store.add_account(&entry.username, &entry.token, &steam_id)? {
            println!("Generated and saved {} ({})", entry.username, steam_id);
        } else {
            println!("Generated {} but it is already saved", entry.username);
        }
        Ok(())
    }
}
