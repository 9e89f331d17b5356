use std::fmt;

use serde::Deserialize;

use crate::client::ConnectOptions;
use crate::error::StoreError;
use crate::protocol::DEFAULT_PORT;

const URL_SCHEME: &str = "redis://";
const TLS_URL_SCHEME: &str = "rediss://";

/// Where the store lives. Exactly one form is used per deployment.
#[derive(Deserialize, Clone, PartialEq)]
#[serde(try_from = "RawStoreTarget")]
pub enum StoreTarget {
    /// `redis://[[username]:password@]host[:port][/db]`
    Url { url: String },
    Address {
        // host[:port]
        address: String,
        #[serde(default)]
        credential: Option<String>,
        #[serde(default)]
        db_index: Option<u32>,
    },
}

// Both forms as written in the configuration file.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStoreTarget {
    url: Option<String>,
    address: Option<String>,
    credential: Option<String>,
    db_index: Option<u32>,
}

impl TryFrom<RawStoreTarget> for StoreTarget {
    type Error = String;

    fn try_from(raw: RawStoreTarget) -> Result<Self, Self::Error> {
        match raw {
            RawStoreTarget {
                url: Some(url),
                address: None,
                credential: None,
                db_index: None,
            } => Ok(StoreTarget::Url { url }),
            RawStoreTarget {
                url: None,
                address: Some(address),
                credential,
                db_index,
            } => Ok(StoreTarget::Address {
                address,
                credential,
                db_index,
            }),
            RawStoreTarget { url: Some(_), .. } => Err(
                "store takes either url or address with credential and db_index, not both".into(),
            ),
            RawStoreTarget { url: None, .. } => Err("store requires url or address".into()),
        }
    }
}

impl Default for StoreTarget {
    fn default() -> Self {
        StoreTarget::Address {
            address: format!("127.0.0.1:{}", DEFAULT_PORT),
            credential: None,
            db_index: None,
        }
    }
}

impl StoreTarget {
    pub fn url(url: impl Into<String>) -> Self {
        StoreTarget::Url { url: url.into() }
    }

    pub fn address(address: impl Into<String>) -> Self {
        StoreTarget::Address {
            address: address.into(),
            credential: None,
            db_index: None,
        }
    }

    pub fn connect_options(&self) -> Result<ConnectOptions, StoreError> {
        match self {
            StoreTarget::Url { url } => parse_url(url),
            StoreTarget::Address {
                address,
                credential,
                db_index,
            } => Ok(ConnectOptions {
                address: with_default_port(address)?,
                password: credential.clone().filter(|c| !c.is_empty()),
                db_index: db_index.unwrap_or(0),
                ..Default::default()
            }),
        }
    }
}

// Credentials never show up in logs or error messages.
impl fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreTarget::Url { url } => match parse_url(url) {
                Ok(options) => write!(f, "{}{}/{}", URL_SCHEME, options.address, options.db_index),
                Err(_) => write!(f, "<malformed url>"),
            },
            StoreTarget::Address {
                address, db_index, ..
            } => write!(f, "{}/{}", address, db_index.unwrap_or(0)),
        }
    }
}

impl fmt::Debug for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "StoreTarget({})", self)
    }
}

fn parse_url(url: &str) -> Result<ConnectOptions, StoreError> {
    if url.starts_with(TLS_URL_SCHEME) {
        return Err(StoreError::invalid_target("tls connections are not supported"));
    }
    let rest = url
        .strip_prefix(URL_SCHEME)
        .ok_or_else(|| StoreError::invalid_target(format!("url must start with {}", URL_SCHEME)))?;

    // Query parameters are not interpreted.
    let rest = rest.split('?').next().unwrap_or_default();

    let (authority, path) = match rest.split_once('/') {
        Some((authority, path)) => (authority, path),
        None => (rest, ""),
    };

    let (userinfo, host) = match authority.rsplit_once('@') {
        Some((userinfo, host)) => (Some(userinfo), host),
        None => (None, authority),
    };

    let (username, password) = match userinfo {
        Some(userinfo) => match userinfo.split_once(':') {
            Some((username, password)) => (
                Some(percent_decode(username)?).filter(|u| !u.is_empty()),
                Some(percent_decode(password)?).filter(|p| !p.is_empty()),
            ),
            // A lone userinfo is the password, like `redis://secret@host`.
            None => (None, Some(percent_decode(userinfo)?).filter(|p| !p.is_empty())),
        },
        None => (None, None),
    };

    let db_index = if path.is_empty() {
        0
    } else {
        path.parse::<u32>()
            .map_err(|_| StoreError::invalid_target(format!("invalid database index {:?}", path)))?
    };

    Ok(ConnectOptions {
        address: with_default_port(host)?,
        username,
        password,
        db_index,
        ..Default::default()
    })
}

fn with_default_port(address: &str) -> Result<String, StoreError> {
    if address.is_empty() || address.starts_with(':') {
        return Err(StoreError::invalid_target("empty host"));
    }
    // `[::1]` has colons but no port.
    let has_port = match address.rfind(']') {
        Some(bracket) => address[bracket..].contains(':'),
        None => address.contains(':'),
    };
    if has_port {
        Ok(address.to_owned())
    } else {
        Ok(format!("{}:{}", address, DEFAULT_PORT))
    }
}

fn percent_decode(s: &str) -> Result<String, StoreError> {
    let bytes = s.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| StoreError::invalid_target("invalid percent encoding"))?;
            decoded.push(hex);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).map_err(|_| StoreError::invalid_target("credential is not utf-8"))
}
