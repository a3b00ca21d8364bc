use std::{env, path::PathBuf, time::Duration};

pub const PORTAL_PAGE_URL: &str = "https://e-consulta.sunat.gob.pe/cl-at-ittipcam/tcS01Alias";
pub const PORTAL_LIST_URL: &str =
    "https://e-consulta.sunat.gob.pe/cl-at-ittipcam/tcS01Alias/listarTipoCambio";

/// Everything a run needs, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    /// Audit identity written to `created_by`.
    pub created_by: Option<String>,
    pub browser: BrowserConfig,
    pub portal: PortalConfig,
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub mode: PersistMode,
}

/// How the deactivate-then-insert pair reaches the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PersistMode {
    /// Parameterized UPDATE followed by INSERT.
    #[default]
    Statements,
    /// `CALL insert_exchange_rate(...)`.
    Procedure,
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub headless: bool,
    pub executable: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub page_url: String,
    pub list_url: String,
    pub request_timeout: Duration,
    /// Time given to the captcha widget to initialise after page load.
    pub settle_delay: Duration,
    pub token_timeout: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            page_url: PORTAL_PAGE_URL.to_string(),
            list_url: PORTAL_LIST_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(2),
            token_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let (host, port) = match lookup("DB_SERVER") {
            Some(server) => split_server(&server),
            None => (None, None),
        };
        let mode = match lookup("DB_PERSIST_MODE").as_deref().map(str::trim) {
            Some(m) if m.eq_ignore_ascii_case("procedure") => PersistMode::Procedure,
            _ => PersistMode::Statements,
        };
        let headless = lookup("BROWSER_HEADLESS")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        Self {
            database: DatabaseConfig {
                host,
                port,
                name: lookup("DB_NAME"),
                user: lookup("DB_USER"),
                password: lookup("DB_PASSWORD"),
                mode,
            },
            created_by: lookup("CREATED_BY"),
            browser: BrowserConfig {
                headless,
                executable: lookup("CHROME_PATH").map(PathBuf::from),
            },
            portal: PortalConfig::default(),
        }
    }
}

/// Splits `host`, `host:port` or `host,port`. An unparsable port is left to
/// the driver default.
fn split_server(server: &str) -> (Option<String>, Option<u16>) {
    let server = server.trim();
    match server.rsplit_once([':', ',']) {
        Some((host, port)) => (Some(host.trim().to_string()), port.trim().parse().ok()),
        None => (Some(server.to_string()), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn absent_variables_stay_absent() {
        let config = config_from(&[]);
        assert!(config.database.host.is_none());
        assert!(config.database.name.is_none());
        assert!(config.database.password.is_none());
        assert!(config.created_by.is_none());
        assert_eq!(config.database.mode, PersistMode::Statements);
        assert!(config.browser.headless);
    }

    #[test]
    fn reads_database_and_audit_settings() {
        let config = config_from(&[
            ("DB_SERVER", "db.internal"),
            ("DB_NAME", "contabilidad"),
            ("DB_USER", "sync"),
            ("DB_PASSWORD", "secret"),
            ("CREATED_BY", "tc-bot"),
            ("DB_PERSIST_MODE", "Procedure"),
            ("BROWSER_HEADLESS", "false"),
        ]);
        assert_eq!(config.database.host.as_deref(), Some("db.internal"));
        assert_eq!(config.database.port, None);
        assert_eq!(config.database.name.as_deref(), Some("contabilidad"));
        assert_eq!(config.database.user.as_deref(), Some("sync"));
        assert_eq!(config.database.password.as_deref(), Some("secret"));
        assert_eq!(config.created_by.as_deref(), Some("tc-bot"));
        assert_eq!(config.database.mode, PersistMode::Procedure);
        assert!(!config.browser.headless);
    }

    #[test]
    fn server_port_forms() {
        assert_eq!(
            split_server("db:5433"),
            (Some("db".to_string()), Some(5433))
        );
        assert_eq!(
            split_server("10.0.0.4,1433"),
            (Some("10.0.0.4".to_string()), Some(1433))
        );
        assert_eq!(split_server("db:abc"), (Some("db".to_string()), None));
    }

    #[test]
    fn portal_defaults() {
        let portal = PortalConfig::default();
        assert_eq!(portal.page_url, PORTAL_PAGE_URL);
        assert!(portal.list_url.ends_with("/listarTipoCambio"));
        assert_eq!(portal.request_timeout, Duration::from_secs(10));
    }
}
