//! Wire protocol: back-to-back JSON records on a persistent TCP stream.
//!
//! Each message is one self-delimiting JSON object tagged by a `command`
//! field. There is no length prefix and no delimiter; the receiver feeds
//! raw bytes into a [`FrameDecoder`], which yields complete records and
//! keeps any trailing partial bytes buffered for the next read.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::board::{Board, FixedMask};
use crate::engine::Difficulty;

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateGame {
        difficulty: Difficulty,
        player_id: Uuid,
    },
    JoinGame {
        game_id: String,
        player_id: Uuid,
    },
    MakeMove {
        game_id: String,
        player_id: Uuid,
        row: usize,
        col: usize,
        number: u8,
    },
    Quit,
}

/// Messages the server sends back, either to one connection or as a room
/// broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectedAck {
        player_id: Uuid,
    },
    /// Full-state snapshot; `your_turn` is computed per recipient.
    GameStateUpdate {
        game_id: String,
        board_data: Board,
        fixed_mask: FixedMask,
        current_turn: Uuid,
        your_turn: bool,
        players_in_game: Vec<Uuid>,
    },
    MoveAccepted {
        row: usize,
        col: usize,
        number: u8,
    },
    MoveRejected {
        reason: String,
    },
    OpponentMoved {
        mover_id: Uuid,
        row: usize,
        col: usize,
        number: u8,
        next_turn: Uuid,
    },
    GameOver {
        game_id: String,
        winner_id: Option<Uuid>,
        reason: String,
    },
    Error {
        message: String,
    },
    Message {
        text: String,
    },
}

/// Serializes a message for the wire. Records self-delimit, so the bytes
/// are written back-to-back with no separator.
pub fn encode(msg: &ServerMessage) -> Vec<u8> {
    // Serialization of a derive-built enum cannot fail.
    serde_json::to_vec(msg).expect("message serialization")
}

/// Largest single record the decoder will buffer. A full state snapshot is
/// well under a kilobyte, so this bounds memory per connection without
/// constraining any real message.
pub const MAX_RECORD_BYTES: usize = 64 * 1024;

/// The byte stream stopped being parseable JSON, or a single record
/// outgrew [`MAX_RECORD_BYTES`]. Unlike an unknown command this is
/// unrecoverable: the record boundary is lost, so the handler treats it
/// like a transport failure.
#[derive(Debug)]
pub enum DecodeError {
    Malformed(serde_json::Error),
    Oversized(usize),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed(err) => write!(f, "malformed message stream: {}", err),
            DecodeError::Oversized(len) => write!(
                f,
                "record exceeds {} bytes ({} buffered)",
                MAX_RECORD_BYTES, len
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Incremental reader for the framing described above.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly read bytes to the buffer.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Consumes and returns the next complete JSON record, or `Ok(None)`
    /// when the buffer holds only a partial record (or whitespace).
    pub fn next_record(&mut self) -> Result<Option<Value>, DecodeError> {
        let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                let consumed = stream.byte_offset();
                self.buf.drain(..consumed);
                Ok(Some(value))
            }
            Some(Err(err)) if err.is_eof() => self.partial(),
            Some(Err(err)) => Err(DecodeError::Malformed(err)),
            None => self.partial(),
        }
    }

    // An incomplete record may keep growing; refuse to buffer it past the
    // cap.
    fn partial(&self) -> Result<Option<Value>, DecodeError> {
        if self.buf.len() > MAX_RECORD_BYTES {
            return Err(DecodeError::Oversized(self.buf.len()));
        }
        Ok(None)
    }

    /// Bytes currently buffered (a trailing partial record, if any).
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Interprets one decoded record as a client command. A record that parses
/// as JSON but not as a known command is reported here, and the caller
/// answers with an `error` reply instead of dropping the connection.
pub fn parse_client_message(value: Value) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack(player_id: Uuid) -> Vec<u8> {
        encode(&ServerMessage::ConnectedAck { player_id })
    }

    #[test]
    fn partial_record_stays_buffered() {
        let bytes = ack(Uuid::new_v4());
        let (head, tail) = bytes.split_at(bytes.len() / 2);

        let mut decoder = FrameDecoder::new();
        decoder.push(head);
        assert!(decoder.next_record().unwrap().is_none());
        assert_eq!(decoder.pending(), head.len());

        decoder.push(tail);
        assert!(decoder.next_record().unwrap().is_some());
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn multiple_records_in_one_read() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut bytes = ack(a);
        bytes.extend_from_slice(&ack(b));

        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes);

        let first = decoder.next_record().unwrap().unwrap();
        assert_eq!(first["player_id"], a.to_string());
        let second = decoder.next_record().unwrap().unwrap();
        assert_eq!(second["player_id"], b.to_string());
        assert!(decoder.next_record().unwrap().is_none());
    }

    #[test]
    fn complete_record_followed_by_partial() {
        let mut bytes = ack(Uuid::new_v4());
        bytes.extend_from_slice(b"{\"command\":\"qu");

        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes);
        assert!(decoder.next_record().unwrap().is_some());
        assert!(decoder.next_record().unwrap().is_none());
        assert!(decoder.pending() > 0);
    }

    #[test]
    fn garbage_is_a_framing_error() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"this is not json");
        assert!(decoder.next_record().is_err());
    }

    #[test]
    fn endless_partial_record_trips_the_size_cap() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"{\"command\":\"message\",\"text\":\"");
        decoder.push(&vec![b'a'; MAX_RECORD_BYTES]);
        match decoder.next_record() {
            Err(DecodeError::Oversized(_)) => {}
            other => panic!("expected oversized error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_command_is_not_a_framing_error() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"{\"command\":\"dance\"}");
        let record = decoder.next_record().unwrap().unwrap();
        assert!(parse_client_message(record).is_err());
    }

    #[test]
    fn client_message_wire_format() {
        let player_id = Uuid::new_v4();
        let json = format!(
            "{{\"command\":\"make_move\",\"game_id\":\"ab12cd34\",\"player_id\":\"{}\",\
             \"row\":3,\"col\":4,\"number\":7}}",
            player_id
        );
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::MakeMove {
                game_id: "ab12cd34".into(),
                player_id,
                row: 3,
                col: 4,
                number: 7,
            }
        );
    }

    #[test]
    fn create_game_difficulty_is_snake_case() {
        let player_id = Uuid::new_v4();
        let json = format!(
            "{{\"command\":\"create_game\",\"difficulty\":\"very_easy\",\"player_id\":\"{}\"}}",
            player_id
        );
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CreateGame {
                difficulty: Difficulty::VeryEasy,
                player_id,
            }
        );
    }

    #[test]
    fn server_message_carries_the_command_tag() {
        let json = serde_json::to_string(&ServerMessage::MoveRejected {
            reason: "not your turn".into(),
        })
        .unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["command"], "move_rejected");
        assert_eq!(value["reason"], "not your turn");
    }
}
