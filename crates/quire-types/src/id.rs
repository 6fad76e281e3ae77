use std::fmt;

use serde::{Deserialize, Serialize};

/// Alphabet used for the 26-character body of every identifier.
const ENCODING: &[u8; 32] = b"ybndrfg8ejkmcpqxot1uwisza345h769";

/// Total identifier length: one prefix character plus the encoded body.
pub const ID_LEN: usize = 27;

/// The kind of entity an identifier names. Encoded as the first character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdType {
    Board,
    Card,
    View,
    Block,
    Category,
    User,
    Team,
}

impl IdType {
    /// The prefix character for this kind.
    pub fn prefix(&self) -> char {
        match self {
            Self::Board => 'b',
            Self::Card => 'c',
            Self::View => 'v',
            Self::Block => 'a',
            Self::Category => 'y',
            Self::User => 'u',
            Self::Team => 't',
        }
    }

    /// Parse a prefix character back into a kind.
    pub fn from_prefix(c: char) -> Option<Self> {
        match c {
            'b' => Some(Self::Board),
            'c' => Some(Self::Card),
            'v' => Some(Self::View),
            'a' => Some(Self::Block),
            'y' => Some(Self::Category),
            'u' => Some(Self::User),
            't' => Some(Self::Team),
            _ => None,
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Generate a new random identifier of the given kind.
pub fn new_id(kind: IdType) -> String {
    let mut id = String::with_capacity(ID_LEN);
    id.push(kind.prefix());
    id.push_str(&encode(uuid::Uuid::new_v4().as_bytes()));
    id
}

/// Returns `true` if `id` has the shape of a generated identifier.
pub fn is_valid_id(id: &str) -> bool {
    let mut chars = id.chars();
    let Some(prefix) = chars.next() else {
        return false;
    };
    id.len() == ID_LEN
        && IdType::from_prefix(prefix).is_some()
        && chars.all(|c| c.is_ascii() && ENCODING.contains(&(c as u8)))
}

/// Returns `true` if `id` has the shape of a board identifier.
///
/// This is a shape check only; it never consults storage.
pub fn is_board_id(id: &str) -> bool {
    is_valid_id(id) && id.starts_with(IdType::Board.prefix())
}

/// Unpadded base32 over [`ENCODING`]. 16 bytes encode to 26 characters.
fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u16 = 0;
    let mut bits = 0u32;

    for &byte in bytes {
        buffer = (buffer << 8) | u16::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let index = ((buffer >> bits) & 0x1f) as usize;
            out.push(ENCODING[index] as char);
        }
    }
    if bits > 0 {
        let index = ((buffer << (5 - bits)) & 0x1f) as usize;
        out.push(ENCODING[index] as char);
    }
    out
}
