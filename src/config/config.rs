use std::path::Path;

use serde::Deserialize;
use tokio::fs;
use tokio::time::Duration;

use crate::config::StoreTarget;
use crate::error::KvjsonError;

// Facade configuration.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Config {
    // Store location.
    #[serde(default)]
    store: Option<StoreTarget>,
    // Deadline for connecting, authenticating and the first ping.
    connect_timeout_milliseconds: Option<u64>,
    // Deadline applied to every store round trip.
    request_timeout_milliseconds: Option<u64>,
    // Size of the read buffer allocated for the connection.
    connection_buffer_bytes: Option<usize>,
}

impl Config {
    const DEFAULT_CONNECT_TIMEOUT_MILLISECONDS: u64 = 5_000;
    const DEFAULT_CONNECTION_BUFFER_BYTES: usize = 1024 * 4;

    pub fn new(store: StoreTarget) -> Self {
        Self {
            store: Some(store),
            ..Default::default()
        }
    }

    pub async fn load_file(path: impl AsRef<Path>) -> Result<Self, KvjsonError> {
        let path = path.as_ref();
        let content = fs::read(path)
            .await
            .map_err(|err| KvjsonError::config(format!("{}: {}", path.display(), err)))?;

        Ok(serde_yaml::from_slice::<Config>(&content)?)
    }

    pub fn set_store(&mut self, val: &mut Option<StoreTarget>) {
        if let Some(val) = val.take() {
            self.store = Some(val)
        }
    }
    pub fn set_connect_timeout_milliseconds(&mut self, val: Option<u64>) {
        if let Some(val) = val {
            self.connect_timeout_milliseconds = Some(std::cmp::max(val, 1));
        }
    }
    // Zero disables the deadline.
    pub fn set_request_timeout_milliseconds(&mut self, val: Option<u64>) {
        if let Some(val) = val {
            self.request_timeout_milliseconds = Some(val);
        }
    }
    pub fn set_connection_buffer_bytes(&mut self, val: Option<usize>) {
        if let Some(val) = val {
            self.connection_buffer_bytes = Some(std::cmp::max(val, 1));
        }
    }

    /// Overwrite values with the ones set in `other`.
    pub fn override_merge(&mut self, other: &mut Config) {
        self.set_store(&mut other.store);
        self.set_connect_timeout_milliseconds(other.connect_timeout_milliseconds);
        self.set_request_timeout_milliseconds(other.request_timeout_milliseconds);
        self.set_connection_buffer_bytes(other.connection_buffer_bytes);
    }

    pub fn store(&self) -> StoreTarget {
        self.store.clone().unwrap_or_default()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(
            self.connect_timeout_milliseconds
                .unwrap_or(Config::DEFAULT_CONNECT_TIMEOUT_MILLISECONDS),
        )
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_milliseconds
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn connection_buffer_bytes(&self) -> usize {
        match self.connection_buffer_bytes {
            Some(val) => val,
            None => Config::DEFAULT_CONNECTION_BUFFER_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn load(yaml: &str) -> Result<Config, KvjsonError> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        tokio_test::block_on(Config::load_file(file.path()))
    }

    #[test]
    fn load_address_form() {
        let config = load(
            r#"
store:
  address: cache.internal:6380
  credential: secret
  db_index: 2
connect_timeout_milliseconds: 250
request_timeout_milliseconds: 100
"#,
        )
        .unwrap();

        let options = config.store().connect_options().unwrap();
        assert_eq!(options.address, "cache.internal:6380");
        assert_eq!(options.password.as_deref(), Some("secret"));
        assert_eq!(options.db_index, 2);
        assert_eq!(config.connect_timeout(), Duration::from_millis(250));
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn load_url_form() {
        let config = load("store:\n  url: redis://:pw@localhost/5\n").unwrap();

        assert_eq!(config.store(), StoreTarget::url("redis://:pw@localhost/5"));
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.connection_buffer_bytes(), 4096);
    }

    #[test]
    fn defaults() {
        let config = load("{}").unwrap();
        let options = config.store().connect_options().unwrap();

        assert_eq!(options.address, "127.0.0.1:6379");
        assert_eq!(config.connect_timeout(), Duration::from_millis(5_000));
    }

    #[test]
    fn invalid_file() {
        let err = load("store: [1, 2]").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);

        let err = tokio_test::block_on(Config::load_file("/nonexistent/kvjson.yaml")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn mixed_store_forms_are_rejected() {
        for yaml in [
            "store:\n  url: redis://a\n  address: b:1\n",
            "store:\n  url: redis://a\n  credential: x\n",
            "store:\n  url: redis://a\n  db_index: 1\n",
            "store:\n  address: b:1\n  password: x\n",
            "store:\n  credential: x\n",
        ] {
            let err = load(yaml).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Config, "{}", yaml);
        }
    }

    #[test]
    fn override_merge_prefers_other() {
        let mut base = Config::new(StoreTarget::address("a:1"));
        base.set_request_timeout_milliseconds(Some(10));

        let mut flags = Config::default();
        flags.set_store(&mut Some(StoreTarget::url("redis://b")));
        flags.set_connect_timeout_milliseconds(Some(0));

        base.override_merge(&mut flags);

        assert_eq!(base.store(), StoreTarget::url("redis://b"));
        assert_eq!(base.connect_timeout(), Duration::from_millis(1));
        assert_eq!(base.request_timeout(), Some(Duration::from_millis(10)));
    }
}
