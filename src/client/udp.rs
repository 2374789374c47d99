//! UDP client sending single-element OSC messages.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;

use crate::blob::StringEncoding;
use crate::codec::OscWriter;
use crate::codec::tag::{TypeTag, single};
use crate::error::Result;
use crate::types::{Color32, MidiMessage, NtpTimestamp, Vector2, Vector3};

const EMPTY_TAGS: [u8; 4] = [b',', 0, 0, 0];
const VECTOR2_TAGS: [u8; 4] = [b',', b'f', b'f', 0];
const VECTOR3_TAGS: [TypeTag; 3] = [TypeTag::Float32; 3];

/// Sends OSC messages to one destination.
///
/// Every send serializes into the client's own [`OscWriter`], so messages
/// are built without allocating once the writer has grown.
pub struct OscClient {
    socket: UdpSocket,
    writer: OscWriter,
    destination: SocketAddr,
}

impl OscClient {
    /// Binds an ephemeral local socket and connects it to `destination`.
    /// Broadcast is enabled when sending to `255.255.255.255`.
    pub async fn connect(destination: SocketAddr) -> Result<Self> {
        Self::connect_with_encoding(destination, StringEncoding::default()).await
    }

    /// Like [`connect`](Self::connect), encoding strings with `encoding`.
    pub async fn connect_with_encoding(
        destination: SocketAddr,
        encoding: StringEncoding,
    ) -> Result<Self> {
        let socket = connect_socket(destination).await?;
        tracing::debug!(%destination, "OSC client connected");

        Ok(Self {
            socket,
            writer: OscWriter::with_encoding(encoding),
            destination,
        })
    }

    /// Where messages are sent.
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// The writer holding the last message sent.
    pub fn writer(&self) -> &OscWriter {
        &self.writer
    }

    async fn flush(&self) -> Result<()> {
        self.socket.send(self.writer.as_bytes()).await?;
        Ok(())
    }

    /// Sends a message with no elements.
    pub async fn send(&mut self, address: &str) -> Result<()> {
        self.writer.write_address_and_tags(address, EMPTY_TAGS);
        self.flush().await
    }

    /// Sends one Int32 element.
    pub async fn send_int(&mut self, address: &str, value: i32) -> Result<()> {
        self.writer.write_address_and_tags(address, single::INT32);
        self.writer.write_i32(value);
        self.flush().await
    }

    /// Sends one Float32 element.
    pub async fn send_float(&mut self, address: &str, value: f32) -> Result<()> {
        self.writer.write_address_and_tags(address, single::FLOAT32);
        self.writer.write_f32(value);
        self.flush().await
    }

    /// Sends one String element in the writer's encoding.
    pub async fn send_str(&mut self, address: &str, value: &str) -> Result<()> {
        self.writer.write_address_and_tags(address, single::STRING);
        self.writer.write_str(value);
        self.flush().await
    }

    /// Sends one Blob element.
    pub async fn send_blob(&mut self, address: &str, value: &[u8]) -> Result<()> {
        self.writer.write_address_and_tags(address, single::BLOB);
        self.writer.write_blob(value);
        self.flush().await
    }

    /// Sends the vector as two Float32 elements.
    pub async fn send_vec2(&mut self, address: &str, value: Vector2) -> Result<()> {
        self.writer.write_address_and_tags(address, VECTOR2_TAGS);
        self.writer.write_vec2(value);
        self.flush().await
    }

    /// Sends the vector as three Float32 elements.
    pub async fn send_vec3(&mut self, address: &str, value: Vector3) -> Result<()> {
        self.writer.reset();
        self.writer.write_str(address);
        self.writer.write_tags(&VECTOR3_TAGS);
        self.writer.write_vec3(value);
        self.flush().await
    }

    /// Sends one Float64 element.
    pub async fn send_double(&mut self, address: &str, value: f64) -> Result<()> {
        self.writer.write_address_and_tags(address, single::FLOAT64);
        self.writer.write_f64(value);
        self.flush().await
    }

    /// Sends one Int64 element.
    pub async fn send_long(&mut self, address: &str, value: i64) -> Result<()> {
        self.writer.write_address_and_tags(address, single::INT64);
        self.writer.write_i64(value);
        self.flush().await
    }

    /// Sends one Color32 element.
    pub async fn send_color32(&mut self, address: &str, value: Color32) -> Result<()> {
        self.writer.write_address_and_tags(address, single::COLOR32);
        self.writer.write_color32(value);
        self.flush().await
    }

    /// Sends one MIDI element.
    pub async fn send_midi(&mut self, address: &str, value: MidiMessage) -> Result<()> {
        self.writer.write_address_and_tags(address, single::MIDI);
        self.writer.write_midi(value);
        self.flush().await
    }

    /// Sends one AsciiChar32 element. Non-ASCII characters become `?`.
    pub async fn send_char(&mut self, address: &str, value: char) -> Result<()> {
        self.writer.write_address_and_tags(address, single::ASCII_CHAR32);
        self.writer.write_char(value);
        self.flush().await
    }

    /// Sends a True or False tag; booleans carry no value bytes.
    pub async fn send_bool(&mut self, address: &str, value: bool) -> Result<()> {
        let tags = if value { single::TRUE } else { single::FALSE };
        self.writer.write_address_and_tags(address, tags);
        self.flush().await
    }

    /// Sends a Nil tag.
    pub async fn send_nil(&mut self, address: &str) -> Result<()> {
        self.writer.write_address_and_tags(address, single::NIL);
        self.flush().await
    }

    /// Sends an Infinitum tag.
    pub async fn send_infinitum(&mut self, address: &str) -> Result<()> {
        self.writer.write_address_and_tags(address, single::INFINITUM);
        self.flush().await
    }

    /// Sends one time tag element.
    pub async fn send_timestamp(&mut self, address: &str, value: NtpTimestamp) -> Result<()> {
        self.writer.write_address_and_tags(address, single::TIME_TAG);
        self.writer.write_timestamp(value);
        self.flush().await
    }

    /// Sends an already-serialized packet, such as a bundle built with a
    /// separate [`OscWriter`].
    pub async fn send_raw(&self, packet: &[u8]) -> Result<()> {
        self.socket.send(packet).await?;
        Ok(())
    }
}

/// Binds an ephemeral socket of `destination`'s family and connects it.
/// Broadcast is enabled for `255.255.255.255`.
pub(super) async fn connect_socket(destination: SocketAddr) -> Result<UdpSocket> {
    let local: SocketAddr = if destination.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local).await?;
    if destination.ip() == Ipv4Addr::BROADCAST {
        socket.set_broadcast(true)?;
    }
    socket.connect(destination).await?;
    Ok(socket)
}

impl std::fmt::Debug for OscClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OscClient")
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Parser;
    use std::time::Duration;

    /// Receives one datagram into a parser and parses it.
    async fn receive(socket: &UdpSocket) -> Parser {
        let mut parser = Parser::new();
        let (len, _) = tokio::time::timeout(
            Duration::from_secs(2),
            socket.recv_from(parser.buffer_mut()),
        )
        .await
        .unwrap()
        .unwrap();
        parser.parse(len).unwrap();
        parser
    }

    async fn pair() -> (UdpSocket, OscClient) {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client = OscClient::connect(server.local_addr().unwrap())
            .await
            .unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn sends_numbers() {
        let (server, mut client) = pair().await;

        client.send_int("/i", 130).await.unwrap();
        assert_eq!(receive(&server).await.values().read_int(0).unwrap(), 130);

        client.send_float("/f", 0.867_924_5).await.unwrap();
        assert_eq!(receive(&server).await.values().read_float(0).unwrap(), 0.867_924_5);

        client.send_long("/h", 50_000_000_000).await.unwrap();
        assert_eq!(
            receive(&server).await.values().read_long(0).unwrap(),
            50_000_000_000
        );

        client.send_double("/d", 0.827_924_529_975_4).await.unwrap();
        assert_eq!(
            receive(&server).await.values().read_double(0).unwrap(),
            0.827_924_529_975_4
        );
    }

    #[tokio::test]
    async fn sends_strings_and_blobs() {
        let (server, mut client) = pair().await;

        client.send_str("/layers/1/name", "intro").await.unwrap();
        let parser = receive(&server).await;
        assert_eq!(parser.address(), "/layers/1/name");
        assert_eq!(parser.values().read_str(0).unwrap(), "intro");

        client.send_blob("/b", &[1, 2, 3, 4, 5, 6]).await.unwrap();
        let parser = receive(&server).await;
        assert_eq!(parser.values().read_blob(0).unwrap(), &[1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn sends_composites() {
        let (server, mut client) = pair().await;

        client
            .send_color32("/c", Color32::new(255, 150, 50, 255))
            .await
            .unwrap();
        assert_eq!(
            receive(&server).await.values().read_color32(0).unwrap(),
            Color32::new(255, 150, 50, 255)
        );

        client
            .send_midi("/m", MidiMessage::new(1, 4, 16, 80))
            .await
            .unwrap();
        assert_eq!(
            receive(&server).await.values().read_midi(0).unwrap(),
            MidiMessage::new(1, 4, 16, 80)
        );

        let stamp = NtpTimestamp::now();
        client.send_timestamp("/t", stamp).await.unwrap();
        assert_eq!(receive(&server).await.values().read_timestamp(0).unwrap(), stamp);

        client.send_char("/ch", 'C').await.unwrap();
        assert_eq!(receive(&server).await.values().read_char(0).unwrap(), 'C');
    }

    #[tokio::test]
    async fn sends_vectors() {
        let (server, mut client) = pair().await;

        client.send_vec2("/v2", Vector2::new(2.5, 1.01)).await.unwrap();
        let parser = receive(&server).await;
        let values = parser.values();
        assert_eq!(values.element_count(), 2);
        assert_eq!(values.read_float(0).unwrap(), 2.5);
        assert_eq!(values.read_float(1).unwrap(), 1.01);

        client
            .send_vec3("/v3", Vector3::new(0.15, -4.2, 1.0))
            .await
            .unwrap();
        let parser = receive(&server).await;
        let values = parser.values();
        assert_eq!(values.element_count(), 3);
        assert_eq!(values.read_float(1).unwrap(), -4.2);
        assert_eq!(values.read_float(2).unwrap(), 1.0);
    }

    #[tokio::test]
    async fn sends_tag_only_messages() {
        let (server, mut client) = pair().await;

        client.send("/ping").await.unwrap();
        let parser = receive(&server).await;
        assert_eq!(parser.address(), "/ping");
        assert_eq!(parser.element_count(), 0);

        client.send_bool("/on", true).await.unwrap();
        assert!(receive(&server).await.values().read_bool(0).unwrap());
        client.send_bool("/off", false).await.unwrap();
        assert!(!receive(&server).await.values().read_bool(0).unwrap());

        client.send_nil("/nil").await.unwrap();
        assert!(receive(&server).await.values().read_nil_or_infinitum(0).unwrap());
        client.send_infinitum("/inf").await.unwrap();
        assert_eq!(
            receive(&server).await.values().read_str(0).unwrap(),
            "Infinitum"
        );
    }

    #[tokio::test]
    async fn writer_holds_last_message() {
        let (server, mut client) = pair().await;
        client.send_float("/composition/tempo", 144.0).await.unwrap();
        let _ = receive(&server).await;

        let mut expected = b"/composition/tempo\0\0,f\0\0".to_vec();
        expected.extend_from_slice(&144.0f32.to_be_bytes());
        assert_eq!(client.writer().as_bytes(), &expected[..]);
        assert_eq!(client.destination(), server.local_addr().unwrap());
    }
}
