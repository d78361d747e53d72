use std::{
    env, fs,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    domain::{Identity, UserId},
    errors::Error,
    ports::ConfigProvider,
    security::AuthorizedPair,
    Result,
};

const DEFAULT_CONFIG_FILE: &str = "config.txt";
const DEFAULT_FIAT: &str = "USD";
const DEFAULT_REPLY_PROBABILITY: f64 = 0.5;

/// Typed bot configuration.
///
/// Parsed from a `Key: value` text file; see `parse_config`.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub primary: Identity,
    pub secondary: Identity,

    // Special dates (raw strings; parsed lazily by the tracker)
    pub birthday: String,
    pub anniversary: String,
    pub celebration_text: String,
    pub celebration_image: PathBuf,

    // Lookups
    pub fiat_symbol: String,
    pub search_engine_id: Option<String>,
    pub search_api_key: Option<String>,

    // Behavior
    pub reply_probability: f64,

    // Persistence
    pub history_file: PathBuf,
    pub marker_file: PathBuf,
}

impl Config {
    pub fn authorized_pair(&self) -> AuthorizedPair {
        AuthorizedPair {
            primary: self.primary.id,
            secondary: self.secondary.id,
        }
    }
}

/// Reads the config file from disk on every `get()`.
#[derive(Clone, Debug)]
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load `.env` (if present) and resolve the config path from `JIMBOT_CONFIG`.
    pub fn from_env() -> Self {
        load_dotenv(Path::new(".env"));
        let path = env_str("JIMBOT_CONFIG")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for FileConfigProvider {
    fn get(&self) -> Result<Config> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            Error::Config(format!("can't read config file {}: {e}", self.path.display()))
        })?;
        let mut cfg = parse_config(&contents)?;
        if let Some(token) = env_str("TELEGRAM_BOT_TOKEN").and_then(non_empty) {
            cfg.telegram_bot_token = token;
        }
        Ok(cfg)
    }
}

/// Parse the `Key: value` config format.
///
/// Blank lines and `#` comments are skipped. Unknown keys are rejected so a
/// typo never silently disables a feature.
pub fn parse_config(contents: &str) -> Result<Config> {
    let mut token = None;
    let mut primary_id = None;
    let mut secondary_id = None;
    let mut primary_name = String::from("you");
    let mut secondary_name = String::from("you");
    let mut birthday = String::new();
    let mut anniversary = String::new();
    let mut celebration_text = String::new();
    let mut celebration_image = PathBuf::from("./img/mem.jpg");
    let mut fiat_symbol = DEFAULT_FIAT.to_string();
    let mut search_engine_id = None;
    let mut search_api_key = None;
    let mut reply_probability = DEFAULT_REPLY_PROBABILITY;
    let mut history_file = PathBuf::from("history.txt");
    let mut marker_file = PathBuf::from(".memdate_detected");

    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            return Err(Error::Config(format!(
                "line {}: expected `Key: value`, got {line:?}",
                idx + 1
            )));
        };
        let key = key.trim();
        let value = value.trim().to_string();

        match key {
            "Token" => token = non_empty(value),
            "PrimaryName" => primary_name = value,
            "PrimaryID" => primary_id = Some(parse_user_id(key, &value)?),
            "SecondaryName" => secondary_name = value,
            "SecondaryID" => secondary_id = Some(parse_user_id(key, &value)?),
            "Birthday" => birthday = value,
            "Anniversary" => anniversary = value,
            "CelebrationText" => celebration_text = value,
            "CelebrationImage" => celebration_image = PathBuf::from(value),
            "FiatSymbol" => fiat_symbol = value.to_uppercase(),
            "SearchEngineID" => search_engine_id = non_empty(value),
            "SearchApiKey" => search_api_key = non_empty(value),
            "ReplyProbability" => {
                reply_probability = value.parse::<f64>().map_err(|_| {
                    Error::Config(format!("ReplyProbability must be a number, got {value:?}"))
                })?
            }
            "HistoryFile" => history_file = PathBuf::from(value),
            "MarkerFile" => marker_file = PathBuf::from(value),
            other => {
                return Err(Error::Config(format!(
                    "line {}: unknown key {other:?}",
                    idx + 1
                )))
            }
        }
    }

    let telegram_bot_token = token
        .or_else(|| env_str("TELEGRAM_BOT_TOKEN").and_then(non_empty))
        .ok_or_else(|| Error::Config("Token is required".to_string()))?;
    let primary_id = primary_id.ok_or_else(|| Error::Config("PrimaryID is required".to_string()))?;
    let secondary_id =
        secondary_id.ok_or_else(|| Error::Config("SecondaryID is required".to_string()))?;
    if fiat_symbol.is_empty() {
        fiat_symbol = DEFAULT_FIAT.to_string();
    }

    Ok(Config {
        telegram_bot_token,
        primary: Identity {
            id: primary_id,
            name: primary_name,
        },
        secondary: Identity {
            id: secondary_id,
            name: secondary_name,
        },
        birthday,
        anniversary,
        celebration_text,
        celebration_image,
        fiat_symbol,
        search_engine_id,
        search_api_key,
        reply_probability,
        history_file,
        marker_file,
    })
}

fn parse_user_id(key: &str, value: &str) -> Result<UserId> {
    value
        .parse::<i64>()
        .map(UserId)
        .map_err(|_| Error::Config(format!("{key} must be an integer, got {value:?}")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Load `KEY=value` pairs from `path` without overriding the existing
/// environment. A missing file is not an error.
fn load_dotenv(path: &Path) {
    match dotenvy::from_path(path) {
        Ok(()) => debug!("loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("ignoring {}: {e}", path.display()),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        telegram_bot_token: "123:abc".to_string(),
        primary: Identity {
            id: UserId(1),
            name: "Jim".to_string(),
        },
        secondary: Identity {
            id: UserId(2),
            name: "Pam".to_string(),
        },
        birthday: "1995-06-14T00:00:00Z".to_string(),
        anniversary: "2015-02-20".to_string(),
        celebration_text: "Happy day!".to_string(),
        celebration_image: PathBuf::from("./img/mem.jpg"),
        fiat_symbol: "USD".to_string(),
        search_engine_id: None,
        search_api_key: None,
        reply_probability: 1.0,
        history_file: PathBuf::from("history.txt"),
        marker_file: PathBuf::from(".memdate_detected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# jimbot config
Token: 123:abc
PrimaryName: Jim
PrimaryID: 1001
SecondaryName: Pam
SecondaryID: 2002

Birthday: 1995-06-14T00:00:00Z
Anniversary: 2015-02-20
CelebrationText: Happy day, love!
FiatSymbol: eur
ReplyProbability: 0.25
";

    #[test]
    fn parses_full_file() {
        let cfg = parse_config(SAMPLE).unwrap();
        assert_eq!(cfg.telegram_bot_token, "123:abc");
        assert_eq!(cfg.primary.id, UserId(1001));
        assert_eq!(cfg.secondary.name, "Pam");
        assert_eq!(cfg.birthday, "1995-06-14T00:00:00Z");
        assert_eq!(cfg.celebration_text, "Happy day, love!");
        assert_eq!(cfg.fiat_symbol, "EUR");
        assert_eq!(cfg.reply_probability, 0.25);
        assert_eq!(cfg.marker_file, PathBuf::from(".memdate_detected"));
    }

    #[test]
    fn authorized_pair_comes_from_identities() {
        let pair = parse_config(SAMPLE).unwrap().authorized_pair();
        assert_eq!(pair.primary, UserId(1001));
        assert_eq!(pair.secondary, UserId(2002));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let contents = format!("{SAMPLE}Favorite: pizza\n");
        let err = parse_config(&contents).unwrap_err();
        assert!(err.to_string().contains("unknown key"), "{err}");
    }

    #[test]
    fn non_numeric_id_is_rejected() {
        let err = parse_config("Token: t\nPrimaryID: abc\nSecondaryID: 2\n").unwrap_err();
        assert!(err.to_string().contains("PrimaryID"), "{err}");
    }

    #[test]
    fn missing_identity_is_rejected() {
        let err = parse_config("Token: t\nPrimaryID: 1\n").unwrap_err();
        assert!(err.to_string().contains("SecondaryID"), "{err}");
    }

    #[test]
    fn line_without_separator_is_rejected() {
        assert!(parse_config("Token t\n").is_err());
    }

    #[test]
    fn provider_rereads_file_on_every_call() {
        let path = std::env::temp_dir().join(format!(
            "jimbot-config-{}-{}.txt",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis()
        ));
        fs::write(&path, "Token: t\nPrimaryID: 1\nSecondaryID: 2\n").unwrap();
        let provider = FileConfigProvider::new(&path);
        assert_eq!(provider.get().unwrap().secondary.id, UserId(2));

        fs::write(&path, "Token: t\nPrimaryID: 1\nSecondaryID: 3\n").unwrap();
        assert_eq!(provider.get().unwrap().secondary.id, UserId(3));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn dotenv_file_fills_but_does_not_override_env() {
        let path = std::env::temp_dir().join(format!(
            "jimbot-dotenv-{}-{}.env",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis()
        ));
        env::set_var("JIMBOT_DOTENV_PRESET", "from-env");
        fs::write(
            &path,
            "# local overrides\nJIMBOT_DOTENV_FRESH=\"quoted value\"\nJIMBOT_DOTENV_PRESET=from-file\n",
        )
        .unwrap();

        load_dotenv(&path);
        assert_eq!(env::var("JIMBOT_DOTENV_FRESH").unwrap(), "quoted value");
        assert_eq!(env::var("JIMBOT_DOTENV_PRESET").unwrap(), "from-env");

        let _ = fs::remove_file(&path);
        load_dotenv(&path);
    }
}
