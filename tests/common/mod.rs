use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use kvjson::error::StoreErrorKind;
use kvjson::protocol::{Command, Connection, Frame};
use kvjson::{MemoryStore, Store, StoreError};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};

const DATABASES: usize = 16;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// RESP server over in memory databases, enough of the redis command set
/// for the facade.
pub struct TestServer {
    addr: SocketAddr,
    databases: Arc<Vec<MemoryStore>>,
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(password: Option<&str>) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let databases = Arc::new((0..DATABASES).map(|_| MemoryStore::new()).collect::<Vec<_>>());
        let shutdown = Arc::new(Notify::new());

        let handle = tokio::spawn(serve(
            listener,
            databases.clone(),
            password.map(str::to_owned),
            shutdown.clone(),
        ));

        Self {
            addr,
            databases,
            shutdown,
            handle,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn db(&self, index: usize) -> &MemoryStore {
        &self.databases[index]
    }

    /// Stop listening and close every client connection.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        self.handle.await.unwrap();
    }
}

/// Address of a port nobody listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    listener.local_addr().unwrap()
}

/// Listener that accepts connections and never answers.
pub async fn silent_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let mut sockets = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            sockets.push(socket);
        }
    });
    (addr, handle)
}

async fn serve(
    listener: TcpListener,
    databases: Arc<Vec<MemoryStore>>,
    password: Option<String>,
    shutdown: Arc<Notify>,
) {
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((socket, _)) => {
                    handlers.spawn(handle(socket, databases.clone(), password.clone()));
                }
                Err(_) => break,
            },
            _ = shutdown.notified() => break,
        }
    }

    // Aborted handlers drop their sockets.
    handlers.shutdown().await;
}

struct Session {
    databases: Arc<Vec<MemoryStore>>,
    password: Option<String>,
    authenticated: bool,
    db: usize,
}

async fn handle(socket: TcpStream, databases: Arc<Vec<MemoryStore>>, password: Option<String>) {
    let mut connection = Connection::new(socket, None);
    let mut session = Session {
        databases,
        authenticated: password.is_none(),
        password,
        db: 0,
    };

    while let Ok(Some(frame)) = connection.read_frame().await {
        let reply = match Command::from_frame(frame) {
            Ok(command) => session.execute(&command).await,
            Err(err) => Frame::Error(format!("ERR protocol error {:?}", err)),
        };
        if connection.write_frame(&reply).await.is_err() {
            break;
        }
    }
}

impl Session {
    async fn execute(&mut self, command: &Command) -> Frame {
        let args = command.args();
        let store = &self.databases[self.db];

        match (command.name(), args.len()) {
            ("AUTH", 1) | ("AUTH", 2) => {
                if self.password.as_deref() == Some(text(&args[args.len() - 1]).as_str()) {
                    self.authenticated = true;
                    Frame::ok()
                } else {
                    Frame::Error("WRONGPASS invalid username-password pair".into())
                }
            }
            _ if !self.authenticated => Frame::Error("NOAUTH Authentication required.".into()),
            ("PING", 0) => Frame::Simple("PONG".into()),
            ("SELECT", 1) => match text(&args[0]).parse::<usize>() {
                Ok(db) if db < DATABASES => {
                    self.db = db;
                    Frame::ok()
                }
                _ => Frame::Error("ERR DB index is out of range".into()),
            },
            ("GET", 1) => reply(store.get(&text(&args[0])).await, nullable),
            ("SET", 2) => reply(
                store.set(&text(&args[0]), args[1].clone(), None).await,
                |_| Frame::ok(),
            ),
            ("SET", 4) if text(&args[2]).eq_ignore_ascii_case("PX") => {
                let ttl = match text(&args[3]).parse::<u64>() {
                    Ok(ms) if ms > 0 => Duration::from_millis(ms),
                    _ => return Frame::Error("ERR invalid expire time in 'set' command".into()),
                };
                reply(
                    store.set(&text(&args[0]), args[1].clone(), Some(ttl)).await,
                    |_| Frame::ok(),
                )
            }
            ("DEL", 1) => reply(store.delete(&text(&args[0])).await, integer),
            ("HGETALL", 1) => reply(store.hgetall(&text(&args[0])).await, |fields| {
                Frame::Array(
                    fields
                        .into_iter()
                        .flat_map(|(field, value)| [Frame::bulk(field), Frame::Bulk(value)])
                        .collect(),
                )
            }),
            ("HGET", 2) => reply(store.hget(&text(&args[0]), &text(&args[1])).await, nullable),
            ("HSET", 3) => reply(
                store
                    .hset(&text(&args[0]), &text(&args[1]), args[2].clone())
                    .await,
                |_| Frame::Integer(1),
            ),
            ("HDEL", 2) => reply(
                store.hdelete(&text(&args[0]), &text(&args[1])).await,
                integer,
            ),
            (name, _) => Frame::Error(format!("ERR unknown command '{}'", name)),
        }
    }
}

fn text(arg: &Bytes) -> String {
    String::from_utf8_lossy(arg).into_owned()
}

fn nullable(value: Option<Bytes>) -> Frame {
    value.map(Frame::Bulk).unwrap_or(Frame::Null)
}

fn integer(n: u64) -> Frame {
    Frame::Integer(n as i64)
}

fn reply<T>(result: Result<T, StoreError>, ok: impl FnOnce(T) -> Frame) -> Frame {
    match result {
        Ok(value) => ok(value),
        Err(err) => match err.kind() {
            StoreErrorKind::Server(message) => Frame::Error(message.clone()),
            _ => Frame::Error(format!("ERR {}", err)),
        },
    }
}
