use std::time::Duration;

/// 環境変数から読み込むアプリケーション設定
///
/// 起動時に一度だけ読み込む。未設定・解釈不能な値は開発用の既定値に
/// フォールバックする。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub max_connections: u32,
    /// borrowトランザクションのロック待ち上限
    pub lock_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/library_lending".into());

        Self {
            database_url,
            port: read_parsed("PORT", 3000),
            max_connections: read_parsed("DB_MAX_CONNECTIONS", 5),
            lock_timeout: Duration::from_millis(read_parsed("LOCK_TIMEOUT_MS", 5_000)),
        }
    }
}

fn read_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
