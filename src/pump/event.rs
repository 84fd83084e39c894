//! Pump.fun event payloads carried in `Program data:` log lines

use solana_sdk::pubkey::Pubkey;

use crate::error::{Error, Result};

/// Decoded CreateEvent payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEvent {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub mint: Pubkey,
    pub bonding_curve: Pubkey,
    pub user: Pubkey,
}

/// Bounds-checked little-endian reader over an event payload
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.offset.checked_add(len)?;
        let bytes = self.data.get(self.offset..end)?;
        self.offset = end;
        Some(bytes)
    }

    fn read_u32(&mut self) -> Option<u32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    fn read_string(&mut self) -> Option<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    fn read_pubkey(&mut self) -> Option<Pubkey> {
        let bytes: [u8; 32] = self.take(32)?.try_into().ok()?;
        Some(Pubkey::new_from_array(bytes))
    }
}

/// Parse a CreateEvent payload
///
/// Layout: 8-byte header (discarded), name, symbol and uri as u32-LE
/// length-prefixed strings, then mint, bonding curve and user (32 bytes each).
/// Fails with [`Error::InvalidInstruction`] naming the first field that runs
/// past the end of the payload.
pub fn parse_create_event(data: &[u8]) -> Result<CreateEvent> {
    let truncated = |field: &str| {
        Error::InvalidInstruction(format!(
            "create event truncated at {} ({} bytes)",
            field,
            data.len()
        ))
    };

    let mut reader = Reader::new(data);
    reader.take(8).ok_or_else(|| truncated("header"))?;

    let name = reader.read_string().ok_or_else(|| truncated("name"))?;
    let symbol = reader.read_string().ok_or_else(|| truncated("symbol"))?;
    let uri = reader.read_string().ok_or_else(|| truncated("uri"))?;
    let mint = reader.read_pubkey().ok_or_else(|| truncated("mint"))?;
    let bonding_curve = reader
        .read_pubkey()
        .ok_or_else(|| truncated("bonding curve"))?;
    let user = reader.read_pubkey().ok_or_else(|| truncated("user"))?;

    Ok(CreateEvent {
        name,
        symbol,
        uri,
        mint,
        bonding_curve,
        user,
    })
}

impl CreateEvent {
    /// Encode back into the on-chain payload layout, header included
    pub fn encode(&self) -> Vec<u8> {
        let mut data = super::program::EVENT_DISCRIMINATORS::CREATE.to_vec();
        for field in [&self.name, &self.symbol, &self.uri] {
            data.extend_from_slice(&(field.len() as u32).to_le_bytes());
            data.extend_from_slice(field.as_bytes());
        }
        data.extend_from_slice(self.mint.as_ref());
        data.extend_from_slice(self.bonding_curve.as_ref());
        data.extend_from_slice(self.user.as_ref());
        data
    }
}
