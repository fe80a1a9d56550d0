//! Phone integration over UDP.
//!
//! The phone app sends short ASCII codes to the assistant's port. The listener never blocks:
//! it is drained from the periodic check.

use crate::error::CoreResult;
use std::io::ErrorKind;
use tokio::net::UdpSocket;

pub const PHONE_RELAY_SPEECH: &str = "Voy a ello";
pub const EMERGENCY_SPEECH: &str = "Llamando a emergencias";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneCode {
    /// "on<key>": the phone app started and announces its unlock key.
    On(String),
    LowBattery,
    Charged,
    /// The emergency call went through; play the recorded message.
    Emergency,
    Unknown(String),
}

impl PhoneCode {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            "b" => PhoneCode::LowBattery,
            "f" => PhoneCode::Charged,
            "c" => PhoneCode::Emergency,
            _ => match raw.strip_prefix("on") {
                Some(key) => PhoneCode::On(key.to_string()),
                None => PhoneCode::Unknown(raw.to_string()),
            },
        }
    }

    /// Spoken notice for `user`, if the code has one.
    pub fn notice(&self, user: &str) -> Option<String> {
        match self {
            PhoneCode::LowBattery => Some(format!("{}, te queda poca batería en el móvil", user)),
            PhoneCode::Charged => Some(format!("{}, tu móvil ya está cargado", user)),
            _ => None,
        }
    }
}

pub struct PhoneListener {
    socket: UdpSocket,
}

impl PhoneListener {
    pub async fn bind(port: u16) -> CoreResult<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        tracing::info!(target: "teodoro::phone", port = port, "Listening for phone codes");
        Ok(Self { socket })
    }

    pub fn local_port(&self) -> CoreResult<u16> {
        Ok(self.socket.local_addr()?.port())
    }

    /// Next pending code without waiting.
    pub fn try_next(&self) -> Option<PhoneCode> {
        let mut buf = [0u8; 1024];
        match self.socket.try_recv_from(&mut buf) {
            Ok((len, from)) => {
                let raw = String::from_utf8_lossy(&buf[..len]);
                tracing::debug!(target: "teodoro::phone", from = %from, "Phone code received");
                Some(PhoneCode::parse(&raw))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                tracing::warn!(target: "teodoro::phone", error = %e, "Phone socket error");
                None
            }
        }
    }

    /// Every code queued since the last poll.
    pub fn drain(&self) -> Vec<PhoneCode> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
