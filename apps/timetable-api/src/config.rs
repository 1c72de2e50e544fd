use std::time::Duration;

/// Outbound mail relay settings. All three variables must be set for email
/// delivery to be enabled.
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// HTTP endpoint of the mail relay (e.g. `https://mail.example.edu/api/send`).
    pub api_url: String,
    /// Bearer token for the relay.
    pub api_key: String,
    /// Sender address placed in the `from` field.
    pub from: String,
}

/// Timetable API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Maximum number of pooled database connections.
    pub db_pool_size: usize,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Mail relay, or `None` when email delivery is not configured.
    pub mail: Option<MailConfig>,
    /// Pause between consecutive notification emails to the same group.
    pub notify_send_delay: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        let mail = match (
            optional_var("MAIL_API_URL"),
            optional_var("MAIL_API_KEY"),
            optional_var("MAIL_FROM"),
        ) {
            (Some(api_url), Some(api_key), Some(from)) => Some(MailConfig {
                api_url,
                api_key,
                from,
            }),
            _ => None,
        };

        Self {
            database_url: required_var("DATABASE_URL"),
            db_pool_size: parsed_var("DB_POOL_SIZE").unwrap_or(20),
            port: parsed_var("PORT").unwrap_or(8000),
            mail,
            notify_send_delay: Duration::from_millis(
                parsed_var("NOTIFY_SEND_DELAY_MS").unwrap_or(500),
            ),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Point a connection string at the `<name>_test` database next to the
/// configured one. Already-suffixed URLs are returned unchanged.
pub fn test_database_url(database_url: &str) -> String {
    let (base, query) = match database_url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (database_url, None),
    };

    let Some((prefix, db_name)) = base.rsplit_once('/') else {
        return database_url.to_string();
    };
    if db_name.is_empty() || db_name.ends_with("_test") {
        return database_url.to_string();
    }

    let mut url = format!("{prefix}/{db_name}_test");
    if let Some(query) = query {
        url.push('?');
        url.push_str(query);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_is_appended_before_query() {
        assert_eq!(
            test_database_url("postgres://u:p@localhost/timetable?sslmode=disable"),
            "postgres://u:p@localhost/timetable_test?sslmode=disable"
        );
        assert_eq!(
            test_database_url("postgres://localhost/timetable"),
            "postgres://localhost/timetable_test"
        );
    }

    #[test]
    fn already_suffixed_url_is_unchanged() {
        let url = "postgres://localhost/timetable_test";
        assert_eq!(test_database_url(url), url);
    }
}
