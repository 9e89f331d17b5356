use std::time::Duration;

use bytes::Bytes;

use crate::protocol::{Frame, FrameError};

/// Request sent to the store, an array of bulk strings on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    args: Vec<Bytes>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<Bytes>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// Parse a command sent by a client.
    pub fn from_frame(frame: Frame) -> Result<Command, FrameError> {
        let frames = match frame {
            Frame::Array(frames) => frames,
            frame => {
                return Err(FrameError::Invalid(format!(
                    "expected command array, got {:?}",
                    frame
                )))
            }
        };
        let mut parts = frames.into_iter().map(|frame| {
            frame
                .into_bytes()
                .ok_or_else(|| FrameError::Invalid("command part must be a string".into()))
        });

        let name = parts
            .next()
            .ok_or_else(|| FrameError::Invalid("empty command".into()))??;
        let name = std::str::from_utf8(&name)
            .map_err(|e| FrameError::Invalid(e.to_string()))?
            .to_owned();

        let mut command = Command::new(name);
        for arg in parts {
            command.args.push(arg?);
        }
        Ok(command)
    }

    pub fn ping() -> Self {
        Command::new("PING")
    }

    pub fn auth(username: Option<&str>, password: &str) -> Self {
        let command = Command::new("AUTH");
        let command = match username {
            Some(username) => command.arg(username.to_owned()),
            None => command,
        };
        command.arg(password.to_owned())
    }

    pub fn select(db_index: u32) -> Self {
        Command::new("SELECT").arg(db_index.to_string())
    }

    pub fn get(key: &str) -> Self {
        Command::new("GET").arg(key.to_owned())
    }

    /// `SET key value [PX milliseconds]`.
    ///
    /// Without `PX` the store drops any expiration the key had.
    pub fn set(key: &str, value: Bytes, ttl: Option<Duration>) -> Self {
        let command = Command::new("SET").arg(key.to_owned()).arg(value);
        match ttl.filter(|ttl| !ttl.is_zero()) {
            // Sub millisecond ttl rounds up so it never reads as "no expiration".
            Some(ttl) => command
                .arg("PX")
                .arg(ttl.as_millis().max(1).to_string()),
            None => command,
        }
    }

    pub fn del(key: &str) -> Self {
        Command::new("DEL").arg(key.to_owned())
    }

    pub fn hgetall(table: &str) -> Self {
        Command::new("HGETALL").arg(table.to_owned())
    }

    pub fn hget(table: &str, field: &str) -> Self {
        Command::new("HGET").arg(table.to_owned()).arg(field.to_owned())
    }

    pub fn hset(table: &str, field: &str, value: Bytes) -> Self {
        Command::new("HSET")
            .arg(table.to_owned())
            .arg(field.to_owned())
            .arg(value)
    }

    pub fn hdel(table: &str, field: &str) -> Self {
        Command::new("HDEL").arg(table.to_owned()).arg(field.to_owned())
    }
}

impl From<Command> for Frame {
    fn from(command: Command) -> Frame {
        let mut frames = Vec::with_capacity(command.args.len() + 1);
        frames.push(Frame::bulk(command.name));
        frames.extend(command.args.into_iter().map(Frame::Bulk));

        Frame::Array(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(command: Command) -> Vec<String> {
        match Frame::from(command) {
            Frame::Array(frames) => frames
                .into_iter()
                .map(|f| String::from_utf8(f.into_bytes().unwrap().to_vec()).unwrap())
                .collect(),
            frame => panic!("unexpected frame {:?}", frame),
        }
    }

    #[test]
    fn set_with_ttl() {
        let got = words(Command::set(
            "user:1",
            Bytes::from_static(b"{}"),
            Some(Duration::from_secs(3)),
        ));
        assert_eq!(got, vec!["SET", "user:1", "{}", "PX", "3000"]);
    }

    #[test]
    fn set_without_ttl() {
        let want = vec!["SET", "k", "1"];
        assert_eq!(words(Command::set("k", Bytes::from_static(b"1"), None)), want);
        assert_eq!(
            words(Command::set("k", Bytes::from_static(b"1"), Some(Duration::ZERO))),
            want
        );
    }

    #[test]
    fn set_rounds_up_sub_millisecond_ttl() {
        let got = words(Command::set(
            "k",
            Bytes::from_static(b"1"),
            Some(Duration::from_micros(10)),
        ));
        assert_eq!(got[3..], ["PX", "1"]);
    }

    #[test]
    fn auth_with_and_without_username() {
        assert_eq!(words(Command::auth(None, "secret")), vec!["AUTH", "secret"]);
        assert_eq!(
            words(Command::auth(Some("app"), "secret")),
            vec!["AUTH", "app", "secret"]
        );
    }

    #[test]
    fn from_frame() {
        let frame = Frame::Array(vec![
            Frame::bulk("hset"),
            Frame::bulk("users"),
            Frame::Simple("f1".into()),
            Frame::bulk("1"),
        ]);
        let command = Command::from_frame(frame).unwrap();

        assert_eq!(command.name(), "HSET");
        assert_eq!(command.args().len(), 3);
        assert_eq!(command, Command::hset("users", "f1", Bytes::from_static(b"1")));
    }

    #[test]
    fn from_frame_rejects_non_array() {
        assert!(Command::from_frame(Frame::Integer(1)).is_err());
        assert!(Command::from_frame(Frame::Array(vec![])).is_err());
        assert!(Command::from_frame(Frame::Array(vec![Frame::Null])).is_err());
    }
}
