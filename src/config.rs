use serde::Deserialize;

pub const DEFAULT_CLOUD_URL: &str = "https://wap.tplinkcloud.com";

const PLACEHOLDER_SERVICE_KEY: &str = "CHANGE_ME_IFTTT_SERVICE_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Base URL of the vendor cloud endpoint. Overridable for tests.
    pub cloud_url: String,
    pub username: String,
    pub password: String,
    /// Shared secret IFTTT sends in the `IFTTT-Service-Key` header.
    pub service_key: String,
    /// When true, action routes wait for the outbound command and surface
    /// device-not-found / cloud failures as non-200 responses. When false
    /// (default), commands are dispatched in the background and the route
    /// answers 200 immediately.
    pub strict_errors: bool,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let service_key =
        std::env::var("IFTTT_SERVICE_KEY").unwrap_or_else(|_| PLACEHOLDER_SERVICE_KEY.into());

    if service_key == PLACEHOLDER_SERVICE_KEY {
        let env_mode = std::env::var("KASALINK_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "IFTTT_SERVICE_KEY is still the insecure placeholder. \
                 Set the service key from the IFTTT partner dashboard before running in production."
            );
        }
        eprintln!("⚠️  IFTTT_SERVICE_KEY is not set — every gated route will reject with 401.");
    }

    // Credentials are presence-checked only; a bad password surfaces as a
    // vendor login error on the first cloud call.
    let username = std::env::var("KASA_USERNAME").unwrap_or_default();
    let password = std::env::var("KASA_PWD")
        .or_else(|_| std::env::var("KASA_PASSWORD"))
        .unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        eprintln!(
            "⚠️  KASA_USERNAME / KASA_PASSWORD are not set — cloud calls will fail to authenticate."
        );
    }

    Ok(Config {
        port: std::env::var("KASALINK_PORT")
            .or_else(|_| std::env::var("PORT"))
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .unwrap_or(8080),
        cloud_url: std::env::var("KASALINK_CLOUD_URL")
            .unwrap_or_else(|_| DEFAULT_CLOUD_URL.into()),
        username,
        password,
        service_key,
        strict_errors: std::env::var("KASALINK_STRICT_ERRORS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
    })
}
