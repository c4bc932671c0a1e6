//! Connected live-reload clients.
//!
//! The accept thread hands raw streams to [`ReloadHub::add_client`]; the
//! notifier calls [`ReloadHub::send`] from the scheduler loop. A reaper
//! thread drops clients that closed their socket.

use std::net::TcpStream;
use std::time::Duration;

use parking_lot::Mutex;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::message::ReloadMessage;

/// Interval between reads that detect closed connections.
const REAP_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Default)]
pub struct ReloadHub {
    clients: Mutex<Vec<WebSocket<TcpStream>>>,
    /// Last outstanding error, replayed to clients that connect later
    pending_error: Mutex<Option<ReloadMessage>>,
}

impl ReloadHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete the handshake and register the client.
    pub fn add_client(&self, stream: TcpStream) {
        let mut ws = match tungstenite::accept(stream) {
            Ok(ws) => ws,
            Err(e) => {
                crate::log!("reload"; "handshake failed: {}", e);
                return;
            }
        };

        if let Err(e) = ws.send(Message::Text(ReloadMessage::connected().to_json().into())) {
            crate::debug!("reload"; "failed to send connected message: {}", e);
            return;
        }

        if let Some(error) = self.pending_error.lock().as_ref()
            && let Err(e) = ws.send(Message::Text(error.to_json().into()))
        {
            crate::debug!("reload"; "failed to send pending error: {}", e);
            return;
        }

        let _ = ws.get_ref().set_nonblocking(true);
        let mut clients = self.clients.lock();
        clients.push(ws);
        crate::debug!("reload"; "client connected (total: {})", clients.len());
    }

    /// Broadcast to every client, tracking the outstanding error.
    pub fn send(&self, message: &ReloadMessage) {
        match message {
            ReloadMessage::Error { .. } => *self.pending_error.lock() = Some(message.clone()),
            ReloadMessage::ClearError => *self.pending_error.lock() = None,
            _ => {}
        }
        self.broadcast(Message::Text(message.to_json().into()));
    }

    fn broadcast(&self, msg: Message) {
        let mut clients = self.clients.lock();
        if clients.is_empty() {
            crate::debug!("reload"; "no clients connected");
            return;
        }

        let count = clients.len();
        clients.retain_mut(|ws| match ws.send(msg.clone()) {
            Ok(()) => true,
            Err(e) => {
                crate::debug!("reload"; "client disconnected: {}", e);
                false
            }
        });
        crate::debug!("reload"; "broadcast to {} clients", count);
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn pending_error(&self) -> Option<ReloadMessage> {
        self.pending_error.lock().clone()
    }

    /// Poll every socket without blocking, dropping closed ones. Runs forever.
    pub fn reap_loop(&self) {
        loop {
            std::thread::sleep(REAP_INTERVAL);
            if crate::core::is_shutdown() {
                self.close_all();
                return;
            }

            self.clients.lock().retain_mut(|ws| match ws.read() {
                Ok(Message::Close(_)) => false,
                Ok(_) => true,
                Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    true
                }
                Err(_) => false,
            });
        }
    }

    fn close_all(&self) {
        for mut ws in self.clients.lock().drain(..) {
            let _ = ws.close(None);
        }
    }
}
