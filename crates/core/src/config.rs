// Player context configuration

use std::time::Duration;

pub const DEFAULT_THREAD_NAME: &str = "MediaPlayerInternal";
pub const DEFAULT_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_PREPARE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_CONTINUOUS_MESSAGES: usize = 4;

const ENV_MESSAGE_TIMEOUT_MS: &str = "MEDIAPLAYER_MESSAGE_TIMEOUT_MS";
const ENV_PREPARE_TIMEOUT_MS: &str = "MEDIAPLAYER_PREPARE_TIMEOUT_MS";
const ENV_THREAD_NAME: &str = "MEDIAPLAYER_THREAD_NAME";

/// Options for a player context and its internal thread
#[derive(Debug, Clone, PartialEq)]
pub struct ContextOptions {
    /// Name of the internal thread
    pub thread_name: String,

    /// Bound on every blocking wait for a message result (`None` = unbounded)
    pub message_timeout: Option<Duration>,

    /// Bound on the completion wait of a synchronous `prepare()`
    pub prepare_timeout: Option<Duration>,

    /// Messages handled back to back before engines are polled
    pub max_continuous_messages: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            message_timeout: Some(DEFAULT_MESSAGE_TIMEOUT),
            prepare_timeout: Some(DEFAULT_PREPARE_TIMEOUT),
            max_continuous_messages: DEFAULT_MAX_CONTINUOUS_MESSAGES,
        }
    }
}

impl ContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `MEDIAPLAYER_*` environment variables.
    ///
    /// Timeouts are given in milliseconds, `0` meaning unbounded. Absent or
    /// unparsable values keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(timeout) = lookup(ENV_MESSAGE_TIMEOUT_MS).and_then(|v| parse_timeout_ms(&v)) {
            options.message_timeout = timeout;
        }
        if let Some(timeout) = lookup(ENV_PREPARE_TIMEOUT_MS).and_then(|v| parse_timeout_ms(&v)) {
            options.prepare_timeout = timeout;
        }
        if let Some(name) = lookup(ENV_THREAD_NAME) {
            let name = name.trim();
            if !name.is_empty() {
                options.thread_name = name.to_string();
            }
        }

        options
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_message_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.message_timeout = timeout;
        self
    }

    pub fn with_prepare_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.prepare_timeout = timeout;
        self
    }

    pub fn with_max_continuous_messages(mut self, count: usize) -> Self {
        self.max_continuous_messages = count.max(1);
        self
    }
}

/// `Some(None)` for 0 (unbounded), `None` when unparsable
fn parse_timeout_ms(value: &str) -> Option<Option<Duration>> {
    match value.trim().parse::<u64>() {
        Ok(0) => Some(None),
        Ok(ms) => Some(Some(Duration::from_millis(ms))),
        Err(_) => {
            log::warn!("Ignoring invalid timeout value: {:?}", value);
            None
        }
    }
}
