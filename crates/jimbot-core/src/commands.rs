//! Bot command routing.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::Config,
    domain::{Role, UserId},
    ports::{PriceProvider, SearchProvider},
    utils::{HII, KISS},
};

pub const UNDER_DEVELOPMENT: &str = "Under development";
pub const UNKNOWN_COMMAND: &str = "Unknown command";

const PRIMARY_ASSET: &str = "BTC";
const ALT_ASSETS: &[&str] = &["XMR", "ETH", "ETC", "BCH"];
const STUB_COMMANDS: &[&str] = &["translate", "pic", "weather", "3_day_forecast", "stat"];

/// Split `/cmd@botname arg1 ...` into a lowercased command name and its args.
pub fn parse_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Whether a command's reply may be sent as Markdown.
///
/// Search results and image commands carry raw URLs whose underscores and
/// brackets break the Markdown parser, so any name containing `google` or
/// `pic` is sent as plain text.
pub fn uses_markdown(command: &str) -> bool {
    let command = command.to_lowercase();
    !command.contains("google") && !command.contains("pic")
}

pub struct CommandRouter {
    prices: Arc<dyn PriceProvider>,
    search: Arc<dyn SearchProvider>,
}

impl CommandRouter {
    pub fn new(prices: Arc<dyn PriceProvider>, search: Arc<dyn SearchProvider>) -> Self {
        Self { prices, search }
    }

    /// Produce the reply text for a command. Never fails: provider errors are
    /// rendered into the reply.
    pub async fn route(&self, name: &str, args: &str, caller: UserId, cfg: &Config) -> String {
        let name = name.to_lowercase();
        info!("[CMD] /{name} from {}", caller.0);

        match name.as_str() {
            "start" => start(caller, cfg),
            "prices" => self.prices(cfg).await,
            "google" => self.google(args).await,
            stub if STUB_COMMANDS.contains(&stub) => UNDER_DEVELOPMENT.to_string(),
            _ => UNKNOWN_COMMAND.to_string(),
        }
    }

    async fn prices(&self, cfg: &Config) -> String {
        let fiat = cfg.fiat_symbol.as_str();

        let mut msg = format!("{HII} I got this list\n`");
        msg.push_str(&"-".repeat(35));
        msg.push('\n');

        match self.prices.quote(PRIMARY_ASSET, fiat).await {
            Ok(q) => msg.push_str(&format!("{} -> {fiat} : {}\n", q.display_name, q.price_in_fiat)),
            Err(e) => msg.push_str(&unavailable_line(PRIMARY_ASSET, &e.to_string())),
        }

        for symbol in ALT_ASSETS {
            match self.prices.quote(symbol, fiat).await {
                Ok(q) => {
                    msg.push_str(&format!("{} -> {fiat} : {}\n", q.display_name, q.price_in_fiat));
                    msg.push_str(&format!(
                        "{} -> {PRIMARY_ASSET} : {}\n",
                        q.display_name, q.price_in_primary
                    ));
                }
                Err(e) => msg.push_str(&unavailable_line(symbol, &e.to_string())),
            }
        }

        msg.push('`');
        msg
    }

    async fn google(&self, args: &str) -> String {
        let query = args.trim();
        if query.is_empty() {
            return "Usage: /google <query>".to_string();
        }

        match self.search.search(query).await {
            Ok(text) => text,
            Err(e) => {
                warn!("[CMD] search failed: {e}");
                format!("Search failed: {e}")
            }
        }
    }
}

fn start(caller: UserId, cfg: &Config) -> String {
    let mut msg = match cfg.authorized_pair().role_of(caller) {
        Some(Role::Secondary) => String::from(
            "Hi, I'm your Telegram bot,\n\
             hope I'll be loved,\n\
             if not, well... blame him,\n\
             and... I love you two\n",
        ),
        Some(Role::Primary) => String::from(
            "Hi, I'm your Telegram bot, and...\n\
             I'll always be here with you,\n\
             and... I love you two\n",
        ),
        None => String::from("There must be something wrong...\n"),
    };
    msg.push_str(KISS);
    msg
}

fn unavailable_line(symbol: &str, err: &str) -> String {
    warn!("[CMD] price quote for {symbol} failed: {err}");
    // Backticks would close the monospace block early.
    format!("{symbol} -> unavailable ({})\n", err.replace('`', "'"))
}
