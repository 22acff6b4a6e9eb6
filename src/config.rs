use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub admin_api_key: String,
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub oracle_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| format!("PORT is not a valid port: {raw}"))?,
            Err(_) => 8080,
        };
        let admin_api_key = required("ADMIN_API_KEY")?;
        let jwt_secret = required("JWT_SECRET")?;
        let db_path = std::env::var("OFTEN_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("often.sqlite"));
        let oracle_base_url = std::env::var("ORACLE_BASE_URL")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| "https://rates.often.dev".to_string());

        Ok(Self {
            port,
            admin_api_key,
            jwt_secret,
            db_path,
            oracle_base_url,
        })
    }
}

fn required(name: &str) -> Result<String, String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| format!("{name} must be set"))
}
