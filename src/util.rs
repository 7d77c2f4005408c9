const METRICS_ENDPOINT: &str = "METRICS_ENDPOINT";

pub fn get_metrics_endpoint() -> Option<String> {
    std::env::var(METRICS_ENDPOINT).ok()
}

const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";

pub fn get_telegram_token() -> Option<String> {
    std::env::var(TELEGRAM_BOT_TOKEN).ok()
}

const TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";

pub fn get_telegram_chat_id() -> Option<i64> {
    let chat_id_from_env = std::env::var(TELEGRAM_CHAT_ID);
    chat_id_from_env.ok().and_then(|res| res.parse().ok())
}

const OPENWEATHERMAP_API_KEY: &str = "OPENWEATHERMAP_API_KEY";

pub fn get_openweathermap_api_key() -> Option<String> {
    std::env::var(OPENWEATHERMAP_API_KEY).ok()
}

const DEFAULT_INTERVAL: u64 = 60;

pub fn get_default_interval() -> u64 {
    DEFAULT_INTERVAL
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub fn get_default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

pub fn get_default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

pub fn get_default_weather_url() -> String {
    "https://api.openweathermap.org".to_string()
}
