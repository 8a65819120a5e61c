//! Shareable election invitations.
//!
//! An invitation names an election (an opaque channel address) and the
//! servers carrying it, rendered as a checksummed base32 string that
//! survives being read over the phone or typed from paper.

use std::fmt;
use std::str::FromStr;

use crate::base32c;
use crate::error::{Error, Result};
use crate::wire::{BufferReader, BufferWriter};

const INVITATION_MAGIC: u32 = 0x1B68_C700;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    /// Channel-specific election address.
    pub address: Vec<u8>,
    /// Server URLs carrying the election, at least one.
    pub servers: Vec<String>,
}

impl Invitation {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = BufferWriter::new();
        w.write_u32(INVITATION_MAGIC);
        w.write_vec(&self.address);
        assert!(self.servers.len() <= 255, "too many servers for one byte");
        w.write_u8(self.servers.len() as u8);
        for server in &self.servers {
            w.write_vec(server.as_bytes());
        }
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = BufferReader::new("invitation", bytes);
        if r.read_u32()? != INVITATION_MAGIC {
            return Err(Error::Parse("invitation", "bad magic"));
        }
        let address = r.read_vec()?.to_vec();
        let count = r.read_u8()? as usize;
        if count == 0 {
            return Err(Error::Parse("invitation", "no servers"));
        }
        let mut servers = Vec::with_capacity(count);
        for _ in 0..count {
            let url = r.read_vec()?;
            servers.push(
                String::from_utf8(url.to_vec())
                    .map_err(|_| Error::Parse("invitation", "invalid UTF-8 server url"))?,
            );
        }
        if !r.is_empty() {
            return Err(Error::Parse("invitation", "trailing bytes"));
        }
        Ok(Invitation { address, servers })
    }
}

impl fmt::Display for Invitation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base32c::check_encode(&self.to_bytes()))
    }
}

impl FromStr for Invitation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Invitation::from_bytes(&base32c::check_decode(s)?)
    }
}
