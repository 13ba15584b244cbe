//! Wire format shared by every peer.
//!
//! A message is a header line of space separated tokens, a blank line (`\r\n\r\n`) and an
//! optional binary body:
//!
//! ```text
//! <Version> <Type> <SenderId> <Fields...> \r\n\r\n <Body>
//! ```
//!
//! Addresses travel as two tokens, `<Host> <Port>`, and node descriptors as three,
//! `<Id> <Host> <Port>`. Field counts are checked strictly: anything else is rejected.

use crate::chord::key::Key;
use crate::chord::types::NodeInfo;
use crate::chord::RING_SIZE;
use crate::error::MessageError;
use bytes::Bytes;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

pub const SEPARATOR: &[u8] = b"\r\n\r\n";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageBody {
    FindSuccessor {
        key: Key,
        initiator: SocketAddr,
        hops: u32,
    },
    Successor {
        key: Key,
        node: NodeInfo,
    },
    GetPredecessor {
        reply_to: SocketAddr,
    },
    Predecessor {
        predecessor: Option<NodeInfo>,
    },
    Notify {
        node: NodeInfo,
    },
    GetSuccessor {
        initiator: SocketAddr,
    },
    NodeSuccessor {
        successor: NodeInfo,
    },
    PutChunk {
        file_id: String,
        chunk_number: u32,
        replication_degree: u32,
        initiator: SocketAddr,
        data: Bytes,
    },
    Stored {
        file_id: String,
        chunk_number: u32,
        sender: SocketAddr,
    },
    Delete {
        file_id: String,
    },
    GetChunk {
        file_id: String,
        chunk_number: u32,
        initiator: SocketAddr,
    },
    Chunk {
        file_id: String,
        chunk_number: u32,
        data: Bytes,
    },
    Removed {
        file_id: String,
        chunk_number: u32,
        sender: SocketAddr,
    },
    StartPutChunk {
        file_id: String,
        chunk_number: u32,
        replication_degree: u32,
        initiator: SocketAddr,
    },
}

impl MessageBody {
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::FindSuccessor { .. } => "FIND_SUCCESSOR",
            MessageBody::Successor { .. } => "SUCCESSOR",
            MessageBody::GetPredecessor { .. } => "GET_PREDECESSOR",
            MessageBody::Predecessor { .. } => "PREDECESSOR",
            MessageBody::Notify { .. } => "NOTIFY",
            MessageBody::GetSuccessor { .. } => "GET_SUCCESSOR",
            MessageBody::NodeSuccessor { .. } => "NODE_SUCCESSOR",
            MessageBody::PutChunk { .. } => "PUT_CHUNK",
            MessageBody::Stored { .. } => "STORED",
            MessageBody::Delete { .. } => "DELETE",
            MessageBody::GetChunk { .. } => "GET_CHUNK",
            MessageBody::Chunk { .. } => "CHUNK",
            MessageBody::Removed { .. } => "REMOVED",
            MessageBody::StartPutChunk { .. } => "START_PUT_CHUNK",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub version: String,
    pub sender_id: u32,
    pub body: MessageBody,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from peer {}", self.body.kind(), self.sender_id)
    }
}

impl Message {
    pub fn new(version: impl Into<String>, sender_id: u32, body: MessageBody) -> Self {
        Self {
            version: version.into(),
            sender_id,
            body,
        }
    }

    pub fn header(&self) -> String {
        let mut tokens = vec![
            self.version.clone(),
            self.body.kind().to_string(),
            self.sender_id.to_string(),
        ];

        match &self.body {
            MessageBody::FindSuccessor { key, initiator, hops } => {
                tokens.push(key.to_string());
                push_address(&mut tokens, initiator);
                tokens.push(hops.to_string());
            }
            MessageBody::Successor { key, node } => {
                tokens.push(key.to_string());
                push_node(&mut tokens, node);
            }
            MessageBody::GetPredecessor { reply_to } => push_address(&mut tokens, reply_to),
            MessageBody::Predecessor { predecessor } => {
                if let Some(node) = predecessor {
                    push_node(&mut tokens, node);
                }
            }
            MessageBody::Notify { node } => push_node(&mut tokens, node),
            MessageBody::GetSuccessor { initiator } => push_address(&mut tokens, initiator),
            MessageBody::NodeSuccessor { successor } => push_node(&mut tokens, successor),
            MessageBody::PutChunk {
                file_id,
                chunk_number,
                replication_degree,
                initiator,
                ..
            }
            | MessageBody::StartPutChunk {
                file_id,
                chunk_number,
                replication_degree,
                initiator,
            } => {
                tokens.push(file_id.clone());
                tokens.push(chunk_number.to_string());
                tokens.push(replication_degree.to_string());
                push_address(&mut tokens, initiator);
            }
            MessageBody::Stored {
                file_id,
                chunk_number,
                sender,
            }
            | MessageBody::Removed {
                file_id,
                chunk_number,
                sender,
            }
            | MessageBody::GetChunk {
                file_id,
                chunk_number,
                initiator: sender,
            } => {
                tokens.push(file_id.clone());
                tokens.push(chunk_number.to_string());
                push_address(&mut tokens, sender);
            }
            MessageBody::Delete { file_id } => tokens.push(file_id.clone()),
            MessageBody::Chunk {
                file_id,
                chunk_number,
                ..
            } => {
                tokens.push(file_id.clone());
                tokens.push(chunk_number.to_string());
            }
        }

        tokens.join(" ")
    }

    pub fn encode(&self) -> Vec<u8> {
        let header = self.header();
        let data: &[u8] = match &self.body {
            MessageBody::PutChunk { data, .. } | MessageBody::Chunk { data, .. } => data.as_ref(),
            _ => &[],
        };

        let mut bytes = Vec::with_capacity(header.len() + SEPARATOR.len() + data.len());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(SEPARATOR);
        bytes.extend_from_slice(data);
        bytes
    }

    pub fn parse(raw: &[u8]) -> Result<Self, MessageError> {
        let split = raw
            .windows(SEPARATOR.len())
            .position(|window| window == SEPARATOR)
            .ok_or(MessageError::MissingSeparator)?;

        let header = std::str::from_utf8(&raw[..split]).map_err(|_| MessageError::InvalidEncoding)?;
        let data = Bytes::copy_from_slice(&raw[split + SEPARATOR.len()..]);

        let tokens: Vec<&str> = header.split_whitespace().collect();
        if tokens.len() < 3 {
            return Err(MessageError::FieldCount {
                kind: tokens.get(1).unwrap_or(&"message").to_string(),
                found: tokens.len(),
            });
        }

        let version = tokens[0].to_string();
        let kind = tokens[1];
        let fields = Fields::new(kind, &tokens);

        let body = match kind {
            "FIND_SUCCESSOR" => {
                fields.expect(&[6, 7])?;
                MessageBody::FindSuccessor {
                    key: fields.key(3, "key")?,
                    initiator: fields.address(4)?,
                    hops: if tokens.len() == 7 { fields.parse(6, "hops")? } else { 0 },
                }
            }
            "SUCCESSOR" => {
                fields.expect(&[7])?;
                MessageBody::Successor {
                    key: fields.key(3, "key")?,
                    node: fields.node(4)?,
                }
            }
            "GET_PREDECESSOR" => {
                fields.expect(&[5])?;
                MessageBody::GetPredecessor {
                    reply_to: fields.address(3)?,
                }
            }
            "PREDECESSOR" => {
                fields.expect(&[3, 6])?;
                MessageBody::Predecessor {
                    predecessor: if tokens.len() == 6 { Some(fields.node(3)?) } else { None },
                }
            }
            "NOTIFY" => {
                fields.expect(&[6])?;
                MessageBody::Notify {
                    node: fields.node(3)?,
                }
            }
            "GET_SUCCESSOR" => {
                fields.expect(&[5])?;
                MessageBody::GetSuccessor {
                    initiator: fields.address(3)?,
                }
            }
            "NODE_SUCCESSOR" => {
                fields.expect(&[6])?;
                MessageBody::NodeSuccessor {
                    successor: fields.node(3)?,
                }
            }
            "PUT_CHUNK" => {
                fields.expect(&[8])?;
                MessageBody::PutChunk {
                    file_id: tokens[3].to_string(),
                    chunk_number: fields.parse(4, "chunk number")?,
                    replication_degree: fields.parse(5, "replication degree")?,
                    initiator: fields.address(6)?,
                    data,
                }
            }
            "STORED" => {
                fields.expect(&[7])?;
                MessageBody::Stored {
                    file_id: tokens[3].to_string(),
                    chunk_number: fields.parse(4, "chunk number")?,
                    sender: fields.address(5)?,
                }
            }
            "DELETE" => {
                fields.expect(&[4])?;
                MessageBody::Delete {
                    file_id: tokens[3].to_string(),
                }
            }
            "GET_CHUNK" => {
                fields.expect(&[7])?;
                MessageBody::GetChunk {
                    file_id: tokens[3].to_string(),
                    chunk_number: fields.parse(4, "chunk number")?,
                    initiator: fields.address(5)?,
                }
            }
            "CHUNK" => {
                fields.expect(&[5])?;
                MessageBody::Chunk {
                    file_id: tokens[3].to_string(),
                    chunk_number: fields.parse(4, "chunk number")?,
                    data,
                }
            }
            "REMOVED" => {
                fields.expect(&[7])?;
                MessageBody::Removed {
                    file_id: tokens[3].to_string(),
                    chunk_number: fields.parse(4, "chunk number")?,
                    sender: fields.address(5)?,
                }
            }
            "START_PUT_CHUNK" => {
                fields.expect(&[8])?;
                MessageBody::StartPutChunk {
                    file_id: tokens[3].to_string(),
                    chunk_number: fields.parse(4, "chunk number")?,
                    replication_degree: fields.parse(5, "replication degree")?,
                    initiator: fields.address(6)?,
                }
            }
            other => return Err(MessageError::UnknownType(other.to_string())),
        };

        Ok(Message {
            version,
            sender_id: fields.parse(2, "sender id")?,
            body,
        })
    }
}

fn push_address(tokens: &mut Vec<String>, address: &SocketAddr) {
    tokens.push(address.ip().to_string());
    tokens.push(address.port().to_string());
}

fn push_node(tokens: &mut Vec<String>, node: &NodeInfo) {
    tokens.push(node.id.to_string());
    push_address(tokens, &node.address);
}

struct Fields<'a> {
    kind: &'a str,
    tokens: &'a [&'a str],
}

impl<'a> Fields<'a> {
    fn new(kind: &'a str, tokens: &'a [&'a str]) -> Self {
        Self { kind, tokens }
    }

    fn expect(&self, counts: &[usize]) -> Result<(), MessageError> {
        if counts.contains(&self.tokens.len()) {
            Ok(())
        } else {
            Err(MessageError::FieldCount {
                kind: self.kind.to_string(),
                found: self.tokens.len(),
            })
        }
    }

    fn parse<T: FromStr>(&self, index: usize, field: &'static str) -> Result<T, MessageError> {
        self.tokens[index]
            .parse()
            .map_err(|_| MessageError::InvalidField {
                field,
                value: self.tokens[index].to_string(),
            })
    }

    fn key(&self, index: usize, field: &'static str) -> Result<Key, MessageError> {
        let key: Key = self.parse(index, field)?;
        if key >= RING_SIZE {
            return Err(MessageError::InvalidField {
                field,
                value: key.to_string(),
            });
        }
        Ok(key)
    }

    fn address(&self, index: usize) -> Result<SocketAddr, MessageError> {
        let host: IpAddr = self.parse(index, "host")?;
        let port: u16 = self.parse(index + 1, "port")?;
        Ok(SocketAddr::new(host, port))
    }

    fn node(&self, index: usize) -> Result<NodeInfo, MessageError> {
        Ok(NodeInfo::new(self.key(index, "node id")?, self.address(index + 1)?))
    }
}
