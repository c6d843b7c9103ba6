//! A thin client for houndd's control socket (§10.6, §10.8): connect,
//! send one newline-delimited JSON request, read one newline-delimited
//! JSON response.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;

use hound_core::control::{Request, Response};
use hound_core::{Error, Result};

pub struct ControlClient {
    stream: UnixStream,
}

impl ControlClient {
    pub fn connect() -> Result<ControlClient> {
        let socket_path = hound_core::paths::socket_path();
        let stream = UnixStream::connect(&socket_path).map_err(|e| {
            Error::Other(format!(
                "failed to connect to houndd at {}: {e} (is it running?)",
                socket_path.display()
            ))
        })?;
        Ok(ControlClient { stream })
    }

    pub fn request(&mut self, request: &Request) -> Result<Response> {
        let mut json = request.to_json()?;
        json.push('\n');
        self.stream.write_all(json.as_bytes())?;

        let mut reader = BufReader::new(&self.stream);
        let mut line = String::new();
        reader.read_line(&mut line)?;
        Response::from_json(&line)
    }
}
