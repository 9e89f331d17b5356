use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::client::Store;
use crate::common::{debug, trace};
use crate::error::{StoreError, StoreErrorKind};
use crate::protocol::{Command, Connection, Frame};

/// Resolved parameters for opening a store session.
#[derive(Clone, PartialEq, Default)]
pub struct ConnectOptions {
    // host:port
    pub address: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db_index: u32,
    pub buffer_bytes: Option<usize>,
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("db_index", &self.db_index)
            .field("buffer_bytes", &self.buffer_bytes)
            .finish()
    }
}

/// Store client holding one long lived connection.
///
/// Requests from concurrent callers are serialized over the connection.
/// A request whose future is dropped after its command was queued still owes
/// a reply. The next request finishes sending what was queued and discards
/// the owed replies before issuing its own command, since the store answers
/// in order.
pub struct Client<T = TcpStream> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    connection: Connection<T>,
    // Replies owed for commands whose callers went away.
    owed: usize,
}

impl Client<TcpStream> {
    /// Open a tcp connection then authenticate and select the database.
    pub async fn connect(options: &ConnectOptions) -> Result<Self, StoreError> {
        let stream = TcpStream::connect(options.address.as_str()).await?;
        stream.set_nodelay(true)?;

        let client = Client::new(stream, options.buffer_bytes);
        client.handshake(options).await?;

        debug!(address = %options.address, db_index = options.db_index, "Store connected");

        Ok(client)
    }
}

impl<T> Client<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: T, buffer_size: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                connection: Connection::new(stream, buffer_size),
                owed: 0,
            }),
        }
    }

    pub async fn handshake(&self, options: &ConnectOptions) -> Result<(), StoreError> {
        if let Some(password) = options.password.as_deref() {
            let reply = self
                .request(Command::auth(options.username.as_deref(), password))
                .await?;
            expect_ok(reply)?;
        }
        if options.db_index != 0 {
            let reply = self.request(Command::select(options.db_index)).await?;
            expect_ok(reply)?;
        }
        Ok(())
    }

    async fn request(&self, command: Command) -> Result<Frame, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.discard_owed().await?;

        trace!(command = command.name(), "Request");

        inner.owed += 1;
        inner.connection.write_frame(&Frame::from(command)).await?;
        let reply = inner.connection.read_frame().await?;
        if reply.is_some() {
            inner.owed -= 1;
        }

        match reply {
            Some(Frame::Error(message)) => Err(StoreErrorKind::Server(message).into()),
            Some(frame) => Ok(frame),
            None => Err(StoreErrorKind::ConnectionClosed.into()),
        }
    }
}

impl<T> Inner<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    async fn discard_owed(&mut self) -> Result<(), StoreError> {
        if self.owed == 0 {
            return Ok(());
        }

        debug!(owed = self.owed, "Discard replies of interrupted requests");

        self.connection.flush().await?;
        while self.owed > 0 {
            match self.connection.read_frame().await? {
                Some(_) => self.owed -= 1,
                None => return Err(StoreErrorKind::ConnectionClosed.into()),
            }
        }
        Ok(())
    }
}

fn expect_ok(reply: Frame) -> Result<(), StoreError> {
    match reply {
        Frame::Simple(s) if s == "OK" => Ok(()),
        frame => Err(StoreError::unexpected_reply(format!(
            "want OK, got {:?}",
            frame
        ))),
    }
}

fn expect_nullable_bulk(reply: Frame) -> Result<Option<Bytes>, StoreError> {
    match reply {
        Frame::Bulk(value) => Ok(Some(value)),
        Frame::Null => Ok(None),
        frame => Err(StoreError::unexpected_reply(format!(
            "want bulk string, got {:?}",
            frame
        ))),
    }
}

fn expect_integer(reply: Frame) -> Result<u64, StoreError> {
    match reply {
        Frame::Integer(n) if n >= 0 => Ok(n as u64),
        frame => Err(StoreError::unexpected_reply(format!(
            "want non negative integer, got {:?}",
            frame
        ))),
    }
}

fn expect_field_values(reply: Frame) -> Result<HashMap<String, Bytes>, StoreError> {
    let frames = match reply {
        Frame::Array(frames) if frames.len() % 2 == 0 => frames,
        // Null array reads as an empty table.
        Frame::Null => return Ok(HashMap::new()),
        frame => {
            return Err(StoreError::unexpected_reply(format!(
                "want field value pairs, got {:?}",
                frame
            )))
        }
    };

    let mut fields = HashMap::with_capacity(frames.len() / 2);
    let mut frames = frames.into_iter();
    while let (Some(field), Some(value)) = (frames.next(), frames.next()) {
        let field = field
            .into_bytes()
            .ok_or_else(|| StoreError::unexpected_reply("field name must be a string"))?;
        let value = value
            .into_bytes()
            .ok_or_else(|| StoreError::unexpected_reply("field value must be a string"))?;
        let field = String::from_utf8(field.to_vec())
            .map_err(|_| StoreError::unexpected_reply("field name is not utf-8"))?;
        fields.insert(field, value);
    }
    Ok(fields)
}

#[async_trait]
impl<T> Store for Client<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn ping(&self) -> Result<chrono::Duration, StoreError> {
        let start = chrono::Utc::now();
        match self.request(Command::ping()).await? {
            Frame::Simple(s) if s == "PONG" => Ok(chrono::Utc::now() - start),
            frame => Err(StoreError::unexpected_reply(format!(
                "want PONG, got {:?}",
                frame
            ))),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        expect_nullable_bulk(self.request(Command::get(key)).await?)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), StoreError> {
        expect_ok(self.request(Command::set(key, value, ttl)).await?)
    }

    async fn delete(&self, key: &str) -> Result<u64, StoreError> {
        expect_integer(self.request(Command::del(key)).await?)
    }

    async fn hgetall(&self, table: &str) -> Result<HashMap<String, Bytes>, StoreError> {
        expect_field_values(self.request(Command::hgetall(table)).await?)
    }

    async fn hget(&self, table: &str, field: &str) -> Result<Option<Bytes>, StoreError> {
        expect_nullable_bulk(self.request(Command::hget(table, field)).await?)
    }

    async fn hset(&self, table: &str, field: &str, value: Bytes) -> Result<(), StoreError> {
        expect_integer(self.request(Command::hset(table, field, value)).await?).map(|_| ())
    }

    async fn hdelete(&self, table: &str, field: &str) -> Result<u64, StoreError> {
        expect_integer(self.request(Command::hdel(table, field)).await?)
    }
}
