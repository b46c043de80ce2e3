mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{LogSettings, ServerSettings, Settings, UpstreamSettings};

/// Environment variables are read as `RELAY__<SECTION>__<KEY>`, e.g.
/// `RELAY__UPSTREAM__BEARER_TOKEN`. Keys themselves contain underscores, so the
/// nesting separator is doubled.
const ENV_PREFIX: &str = "RELAY";

/// Loads the configuration from the default file and environment variables
/// and merges it over the default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let server = partial.server;
    let upstream = partial.upstream;
    let log = partial.log;

    Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
            http_port: server
                .as_ref()
                .and_then(|s| s.http_port)
                .unwrap_or(default.server.http_port),
            hostname: server
                .as_ref()
                .and_then(|s| s.hostname.clone())
                .unwrap_or(default.server.hostname),
        },
        upstream: UpstreamSettings {
            api_url: upstream
                .as_ref()
                .and_then(|u| u.api_url.clone())
                .unwrap_or(default.upstream.api_url),
            stream_url: upstream
                .as_ref()
                .and_then(|u| u.stream_url.clone())
                .unwrap_or(default.upstream.stream_url),
            consumer_key: secret(
                upstream.as_ref().and_then(|u| u.consumer_key.clone()),
                default.upstream.consumer_key,
            ),
            consumer_secret: secret(
                upstream.as_ref().and_then(|u| u.consumer_secret.clone()),
                default.upstream.consumer_secret,
            ),
            access_token: secret(
                upstream.as_ref().and_then(|u| u.access_token.clone()),
                default.upstream.access_token,
            ),
            access_token_secret: secret(
                upstream.as_ref().and_then(|u| u.access_token_secret.clone()),
                default.upstream.access_token_secret,
            ),
            bearer_token: secret(
                upstream.as_ref().and_then(|u| u.bearer_token.clone()),
                default.upstream.bearer_token,
            ),
            search_limit: upstream
                .as_ref()
                .and_then(|u| u.search_limit)
                .unwrap_or(default.upstream.search_limit),
        },
        log: LogSettings {
            level: log
                .and_then(|l| l.level)
                .unwrap_or(default.log.level),
        },
    }
}

/// Credentials set to an empty string count as unset.
fn secret(value: Option<String>, default: Option<String>) -> Option<String> {
    value.or(default).filter(|v| !v.is_empty())
}
