//! Statement logging configuration.

use tracing::Level;

/// Controls how executed SQL is reported through `tracing`.
///
/// Events are emitted on target `pgforge.sql` before the statement is sent.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
    /// Optional tag attached to every event and passed to tagged client calls.
    pub tag: Option<String>,
    /// Whether to emit events at all.
    pub logging: bool,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
            tag: None,
            logging: true,
        }
    }
}

impl ExecConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    /// Attach a tag to emitted events.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Enable or disable statement logging.
    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    pub(crate) fn emit(&self, sql: &str, param_count: usize) {
        if !self.logging {
            return;
        }

        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate_sql(sql);
        let tag = self.tag.as_deref().unwrap_or("-");
        emit_at_level!(
            self.level,
            target: "pgforge.sql",
            tag,
            param_count,
            sql = %sql,
        );
    }
}

/// Cut `sql` to at most `max_bytes`, backing off to a char boundary.
fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ExecConfig::default();
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.max_sql_length, Some(200));
        assert!(config.logging);
        assert!(config.tag.is_none());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let config = ExecConfig::new().max_sql_length(4);
        assert_eq!(config.truncate_sql("SELECT 1"), "SELE...");
        assert_eq!(config.truncate_sql("SEL"), "SEL");

        let config = ExecConfig::new().max_sql_length(2);
        assert_eq!(config.truncate_sql("é1234"), "é...");

        let config = ExecConfig::new().max_sql_length(1).no_truncate();
        assert_eq!(config.truncate_sql("SELECT 1"), "SELECT 1");
    }
}
