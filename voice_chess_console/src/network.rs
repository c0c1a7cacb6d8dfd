use std::io;
use std::net::TcpStream;

use tungstenite::protocol::Role;
use tungstenite::{Message, WebSocket};
use url::Url;


#[derive(Debug)]
pub enum CommunicationError {
    Io(io::Error),
    Url(url::ParseError),
    Socket(tungstenite::Error),
    Protocol(String),
}

impl std::fmt::Display for CommunicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommunicationError::Io(err) => write!(f, "{err}"),
            CommunicationError::Url(err) => write!(f, "{err}"),
            CommunicationError::Socket(err) => write!(f, "{err}"),
            CommunicationError::Protocol(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CommunicationError {}

pub fn game_channel_url(server_address: &str, session_id: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("ws://{server_address}/ws/{session_id}"))
}

pub fn connect(
    server_address: &str, session_id: &str,
) -> Result<WebSocket<TcpStream>, CommunicationError> {
    let url = game_channel_url(server_address, session_id).map_err(CommunicationError::Url)?;
    let stream = TcpStream::connect(server_address).map_err(CommunicationError::Io)?;
    let (socket, _) = tungstenite::client(url, stream).map_err(|err| match err {
        tungstenite::HandshakeError::Failure(err) => CommunicationError::Socket(err),
        tungstenite::HandshakeError::Interrupted(_) => {
            CommunicationError::Protocol("Handshake interrupted".to_owned())
        }
    })?;
    Ok(socket)
}

pub fn write_text<S>(socket: &mut WebSocket<S>, text: String) -> Result<(), CommunicationError>
where
    S: io::Read + io::Write,
{
    socket.send(Message::text(text)).map_err(CommunicationError::Socket)
}

// Blocks until the next text frame. Control frames are skipped.
pub fn read_text<S>(socket: &mut WebSocket<S>) -> Result<String, CommunicationError>
where
    S: io::Read + io::Write,
{
    loop {
        match socket.read().map_err(CommunicationError::Socket)? {
            Message::Text(text) => return Ok(text.as_str().to_owned()),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            Message::Close(_) => return Err(CommunicationError::Protocol("Closed".to_owned())),
            msg @ Message::Binary(_) => {
                return Err(CommunicationError::Protocol(format!("Expected text, got {msg:?}")));
            }
        }
    }
}

// Improvement potential: Instead of cloning the socket, call TcpStream.set_nonblocking on the
//   underlying stream and do reads and writes in the same thread.
pub fn clone_websocket(socket: &WebSocket<TcpStream>) -> io::Result<WebSocket<TcpStream>> {
    let stream = socket.get_ref().try_clone()?;
    let config = socket.get_config().clone();
    Ok(WebSocket::from_raw_socket(stream, Role::Client, Some(config)))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_url() {
        assert_eq!(
            game_channel_url("127.0.0.1:8766", "default").unwrap().as_str(),
            "ws://127.0.0.1:8766/ws/default"
        );
    }
}
