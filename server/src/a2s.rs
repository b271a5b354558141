//! Source engine A2S queries over UDP
//!
//! Only single-packet responses are understood. A split response header is
//! reported as a protocol error rather than reassembled, which is enough for
//! the info and player queries of servers with modest rosters.

use crate::error::QueryError;
use crate::query::{InfoResponse, PlayerEntry, PlayerResponse, QueryConnector, QuerySession};
use async_trait::async_trait;
use log::{debug, warn};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time;

const SINGLE_PACKET: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];
const SPLIT_PACKET: [u8; 4] = [0xFE, 0xFF, 0xFF, 0xFF];
const INFO_PAYLOAD: &[u8] = b"Source Engine Query\0";
const MAX_RESPONSE_SIZE: usize = 1400;

const A2S_INFO: u8 = 0x54;
const A2S_PLAYER: u8 = 0x55;
const S2A_INFO: u8 = 0x49;
const S2A_PLAYER: u8 = 0x44;
const S2C_CHALLENGE: u8 = 0x41;

const SOURCE_PROTOCOL: u8 = 17;

fn info_request(challenge: Option<[u8; 4]>) -> Vec<u8> {
    let mut request = Vec::with_capacity(29);
    request.extend_from_slice(&SINGLE_PACKET);
    request.push(A2S_INFO);
    request.extend_from_slice(INFO_PAYLOAD);
    if let Some(challenge) = challenge {
        request.extend_from_slice(&challenge);
    }
    request
}

fn player_request(challenge: [u8; 4]) -> Vec<u8> {
    let mut request = Vec::with_capacity(9);
    request.extend_from_slice(&SINGLE_PACKET);
    request.push(A2S_PLAYER);
    request.extend_from_slice(&challenge);
    request
}

/// Cursor over a response payload
struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], QueryError> {
        let end = self.pos + len;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| QueryError::protocol("truncated packet"))?;
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, QueryError> {
        Ok(self.take(1)?[0])
    }

    fn u16_le(&mut self) -> Result<u16, QueryError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn i32_le(&mut self) -> Result<i32, QueryError> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn f32_le(&mut self) -> Result<f32, QueryError> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn challenge(&mut self) -> Result<[u8; 4], QueryError> {
        let bytes = self.take(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn cstring(&mut self) -> Result<String, QueryError> {
        let rest = &self.data[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| QueryError::protocol("unterminated string"))?;
        let value = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += len + 1;
        Ok(value)
    }
}

/// Strips the single-packet header, rejecting split and unknown headers
fn payload(packet: &[u8]) -> Result<&[u8], QueryError> {
    match packet.get(..4) {
        Some(header) if header == SINGLE_PACKET => Ok(&packet[4..]),
        Some(header) if header == SPLIT_PACKET => {
            Err(QueryError::protocol("split responses are not supported"))
        }
        _ => Err(QueryError::protocol("missing packet header")),
    }
}

fn parse_info(payload: &[u8]) -> Result<InfoResponse, QueryError> {
    let mut reader = PacketReader::new(payload);
    let kind = reader.u8()?;
    if kind != S2A_INFO {
        return Err(QueryError::protocol(format!(
            "expected info response, got 0x{kind:02X}"
        )));
    }

    let _protocol = reader.u8()?;
    let name = reader.cstring()?;
    let map = reader.cstring()?;
    let _folder = reader.cstring()?;
    let _game = reader.cstring()?;
    let _app_id = reader.u16_le()?;
    let players = reader.u8()?;
    let max_players = reader.u8()?;
    let bots = reader.u8()?;

    Ok(InfoResponse {
        name,
        map,
        players,
        max_players,
        bots,
    })
}

fn parse_players(payload: &[u8]) -> Result<PlayerResponse, QueryError> {
    let mut reader = PacketReader::new(payload);
    let kind = reader.u8()?;
    if kind != S2A_PLAYER {
        return Err(QueryError::protocol(format!(
            "expected player response, got 0x{kind:02X}"
        )));
    }

    let count = reader.u8()?;
    let mut players = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let _index = reader.u8()?;
        let name = reader.cstring()?;
        let score = reader.i32_le()?;
        let seconds = reader.f32_le()?;
        players.push(PlayerEntry {
            name,
            score,
            duration: Duration::try_from_secs_f32(seconds).unwrap_or_default(),
        });
    }

    Ok(PlayerResponse { players })
}

/// Returns the challenge if `payload` is a challenge response
fn challenge_of(payload: &[u8]) -> Result<Option<[u8; 4]>, QueryError> {
    let mut reader = PacketReader::new(payload);
    if reader.u8()? != S2C_CHALLENGE {
        return Ok(None);
    }
    reader.challenge().map(Some)
}

pub fn encode_info_response(info: &InfoResponse) -> Vec<u8> {
    let mut packet = Vec::with_capacity(64 + info.name.len() + info.map.len());
    packet.extend_from_slice(&SINGLE_PACKET);
    packet.push(S2A_INFO);
    packet.push(SOURCE_PROTOCOL);
    for field in [info.name.as_str(), info.map.as_str(), "csgo", "Counter-Strike 2"] {
        packet.extend_from_slice(field.as_bytes());
        packet.push(0);
    }
    packet.extend_from_slice(&730u16.to_le_bytes());
    packet.push(info.players);
    packet.push(info.max_players);
    packet.push(info.bots);
    packet.push(b'd');
    packet.push(b'l');
    packet.push(0); // visibility
    packet.push(1); // vac
    packet.extend_from_slice(b"1.0.0.0\0");
    packet
}

pub fn encode_player_response(roster: &PlayerResponse) -> Vec<u8> {
    let count = roster.players.len().min(u8::MAX as usize);
    let mut packet = Vec::with_capacity(6 + count * 32);
    packet.extend_from_slice(&SINGLE_PACKET);
    packet.push(S2A_PLAYER);
    packet.push(count as u8);
    for (index, player) in roster.players.iter().take(count).enumerate() {
        packet.push(index as u8);
        packet.extend_from_slice(player.name.as_bytes());
        packet.push(0);
        packet.extend_from_slice(&player.score.to_le_bytes());
        packet.extend_from_slice(&player.duration.as_secs_f32().to_le_bytes());
    }
    packet
}

pub fn encode_challenge(challenge: [u8; 4]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(9);
    packet.extend_from_slice(&SINGLE_PACKET);
    packet.push(S2C_CHALLENGE);
    packet.extend_from_slice(&challenge);
    packet
}

#[derive(Debug, Clone, Copy, Default)]
pub struct A2sConnector;

#[async_trait]
impl QueryConnector for A2sConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Box<dyn QuerySession>, QueryError> {
        let session = time::timeout(timeout, A2sSession::connect(host, port, timeout))
            .await
            .map_err(|_| QueryError::Timeout(timeout))??;
        Ok(Box::new(session))
    }
}

pub struct A2sSession {
    socket: Option<UdpSocket>,
    timeout: Duration,
}

impl A2sSession {
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, QueryError> {
        let target = lookup_host((host, port)).await?.next().ok_or_else(|| {
            QueryError::Transport(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for {host}"),
            ))
        })?;

        let bind_addr: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(target).await?;
        debug!("Query session opened to {target}");

        Ok(Self {
            socket: Some(socket),
            timeout,
        })
    }

    async fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, QueryError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| QueryError::protocol("session is closed"))?;

        socket.send(request).await?;

        let mut buf = vec![0u8; MAX_RESPONSE_SIZE];
        let len = time::timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| QueryError::Timeout(self.timeout))??;
        buf.truncate(len);

        Ok(payload(&buf)?.to_vec())
    }
}

#[async_trait]
impl QuerySession for A2sSession {
    async fn get_info(&mut self) -> Result<InfoResponse, QueryError> {
        let mut response = self.exchange(&info_request(None)).await?;
        if let Some(challenge) = challenge_of(&response)? {
            response = self.exchange(&info_request(Some(challenge))).await?;
        }
        parse_info(&response)
    }

    async fn get_players(&mut self) -> Result<PlayerResponse, QueryError> {
        let mut response = self.exchange(&player_request(SINGLE_PACKET)).await?;
        if let Some(challenge) = challenge_of(&response)? {
            response = self.exchange(&player_request(challenge)).await?;
        }
        parse_players(&response)
    }

    async fn disconnect(&mut self) -> Result<(), QueryError> {
        self.socket.take();
        Ok(())
    }
}

/// Answers A2S requests from fixed data
#[derive(Debug, Clone)]
pub struct Responder {
    pub info: InfoResponse,
    pub roster: PlayerResponse,
    challenge: [u8; 4],
    require_challenge: bool,
}

impl Responder {
    pub fn new(info: InfoResponse, roster: PlayerResponse) -> Self {
        Self {
            info,
            roster,
            challenge: [0x4B, 0x1D, 0x2C, 0x07],
            require_challenge: true,
        }
    }

    /// Answers info and player requests directly, the way older servers do
    pub fn without_challenge(mut self) -> Self {
        self.require_challenge = false;
        self
    }

    pub fn handle(&self, request: &[u8]) -> Option<Vec<u8>> {
        let body = payload(request).ok()?;
        let (&kind, rest) = body.split_first()?;

        match kind {
            A2S_INFO => {
                let challenge = rest.strip_prefix(INFO_PAYLOAD)?;
                if self.require_challenge && challenge != self.challenge {
                    Some(encode_challenge(self.challenge))
                } else {
                    Some(encode_info_response(&self.info))
                }
            }
            A2S_PLAYER => {
                let challenge = rest.get(..4)?;
                if self.require_challenge && challenge != self.challenge {
                    Some(encode_challenge(self.challenge))
                } else {
                    Some(encode_player_response(&self.roster))
                }
            }
            _ => None,
        }
    }

    /// Serves requests on `socket` until it fails
    pub async fn serve(self, socket: UdpSocket) -> io::Result<()> {
        let mut buf = [0u8; MAX_RESPONSE_SIZE];
        loop {
            let (len, addr) = socket.recv_from(&mut buf).await?;
            match self.handle(&buf[..len]) {
                Some(response) => {
                    if let Err(e) = socket.send_to(&response, addr).await {
                        warn!("Failed to answer query from {addr}: {e}");
                    }
                }
                None => debug!("Ignoring {len} byte datagram from {addr}"),
            }
        }
    }
}
