use std::net::UdpSocket;

use super::{Envelope, Transport};
use crate::error::TransportError;

/// UDP client sending each envelope as a timetagged OSC bundle.
#[derive(Debug)]
pub struct OscClient {
    name: String,
    target: String,
    socket: UdpSocket,
}

impl OscClient {
    pub fn open(ip: &str, port: u16, name: &str) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.connect((ip, port))?;
        let target = format!("{ip}:{port}");
        tracing::info!(name, %target, "OSC client connected");
        Ok(Self {
            name: name.to_string(),
            target,
            socket,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Transport for OscClient {
    fn dispatch(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let bytes = envelope.encode()?;
        self.socket.send(&bytes)?;
        tracing::trace!(client = %self.name, bytes = bytes.len(), "bundle sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Number;
    use rosc::{OscPacket, OscType};
    use std::time::Duration;

    #[test]
    fn delivers_bundle_over_loopback() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let client = OscClient::open("127.0.0.1", port, "test").unwrap();
        assert_eq!(client.name(), "test");
        let envelope = Envelope::stamped(
            "/mrp/midi",
            vec![Number::Int(0x9F), Number::Int(60), Number::Int(127)],
            Duration::ZERO,
        )
        .unwrap();
        client.dispatch(&envelope).unwrap();

        let mut buf = [0u8; rosc::decoder::MTU];
        let n = receiver.recv(&mut buf).unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buf[..n]).unwrap();
        let OscPacket::Bundle(bundle) = packet else {
            panic!("expected a bundle");
        };
        let OscPacket::Message(msg) = &bundle.content[0] else {
            panic!("expected a message");
        };
        assert_eq!(msg.addr, "/mrp/midi");
        assert_eq!(
            msg.args,
            vec![OscType::Int(0x9F), OscType::Int(60), OscType::Int(127)]
        );
    }
}
