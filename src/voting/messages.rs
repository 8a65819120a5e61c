//! Messages posted to the broadcast channel.
//!
//! Each message is a one-byte kind tag followed by a length-prefixed
//! payload; the tag equals the phase the message belongs to. Decoding a
//! log is lenient about content and strict about framing: unknown tags
//! and unparseable payloads are skipped so one bad posting cannot wedge
//! an election, but a framing error means the remainder of the stream
//! cannot be located and aborts the decode.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::error::{Error, Result};
use crate::util::{hash, HashValue};
use crate::vdf::VdfSolution;
use crate::wire::{BufferReader, BufferWriter};

use super::ballot::SignedBallot;
use super::params::ElectionPhase;
use super::ElectionId;

/// A credential commitment signed by a long-term voter key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialMessage {
    pub credential: Vec<u8>,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl CredentialMessage {
    /// Builds a message over `credential` signed with `key`, bound to
    /// the election so postings cannot be replayed across elections.
    pub fn sign(credential: Vec<u8>, key: &SigningKey, election_id: &ElectionId) -> Self {
        let mut msg = election_id.to_vec();
        msg.extend_from_slice(&credential);
        let signature = key.sign(&msg);
        CredentialMessage {
            credential,
            public_key: key.verifying_key().to_bytes().to_vec(),
            signature: signature.to_bytes().to_vec(),
        }
    }

    pub fn verify(&self, election_id: &ElectionId) -> Result<()> {
        let key_bytes: [u8; 32] = self
            .public_key
            .as_slice()
            .try_into()
            .map_err(|_| Error::Parse("credential message", "bad public key length"))?;
        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|_| Error::Crypto("malformed voter public key"))?;
        let signature = Signature::from_slice(&self.signature)
            .map_err(|_| Error::Crypto("malformed credential signature"))?;
        let mut msg = election_id.to_vec();
        msg.extend_from_slice(&self.credential);
        key.verify(&msg, &signature)
            .map_err(|_| Error::Crypto("invalid credential signature"))
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut w = BufferWriter::new();
        w.write_vec(&self.credential);
        w.write_vec(&self.public_key);
        w.write(&self.signature);
        w.into_bytes()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = BufferReader::new("credential message", bytes);
        let credential = r.read_vec()?.to_vec();
        let public_key = r.read_vec()?.to_vec();
        let signature = r.read_remaining().to_vec();
        Ok(CredentialMessage {
            credential,
            public_key,
            signature,
        })
    }
}

/// A revealed puzzle solution, keyed by the hash of its input so
/// holders of an encrypted ballot can find the matching reveal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionMessage {
    pub input_hash: HashValue,
    pub output: Vec<u8>,
    pub proof: Vec<u8>,
}

impl DecryptionMessage {
    pub fn from_solution(sol: &VdfSolution) -> Self {
        DecryptionMessage {
            input_hash: hash(&sol.input),
            output: sol.output.clone(),
            proof: sol.proof.clone(),
        }
    }

    /// Reassembles the claimed solution for a known puzzle input.
    pub fn solution_for(&self, input: &[u8]) -> VdfSolution {
        VdfSolution {
            input: input.to_vec(),
            output: self.output.clone(),
            proof: self.proof.clone(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut w = BufferWriter::new();
        w.write(&self.input_hash);
        w.write_vec(&self.output);
        w.write(&self.proof);
        w.into_bytes()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = BufferReader::new("decryption message", bytes);
        let input_hash = r.read_hash()?;
        let output = r.read_vec()?.to_vec();
        let proof = r.read_remaining().to_vec();
        Ok(DecryptionMessage {
            input_hash,
            output,
            proof,
        })
    }
}

/// Anything a participant may post to the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Credential(CredentialMessage),
    Ballot(SignedBallot),
    Decryption(DecryptionMessage),
}

impl Message {
    /// The phase during which this message kind is posted; its
    /// discriminant is the wire tag.
    pub fn phase(&self) -> ElectionPhase {
        match self {
            Message::Credential(_) => ElectionPhase::CredGen,
            Message::Ballot(_) => ElectionPhase::Cast,
            Message::Decryption(_) => ElectionPhase::Tally,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let payload = match self {
            Message::Credential(m) => m.to_bytes(),
            Message::Ballot(m) => m.to_bytes(),
            Message::Decryption(m) => m.to_bytes(),
        };
        let mut w = BufferWriter::new();
        w.write_u8(self.phase() as u8);
        w.write_vec(&payload);
        w.into_bytes()
    }

    /// Decodes a concatenated stream of messages.
    pub fn decode_stream(bytes: &[u8]) -> Result<Vec<Message>> {
        let mut r = BufferReader::new("message stream", bytes);
        let mut messages = Vec::new();
        while !r.is_empty() {
            let tag = r.read_u8()?;
            let payload = r.read_vec()?;
            let decoded = match tag {
                t if t == ElectionPhase::CredGen as u8 => {
                    CredentialMessage::from_bytes(payload).map(Message::Credential)
                }
                t if t == ElectionPhase::Cast as u8 => {
                    SignedBallot::from_bytes(payload).map(Message::Ballot)
                }
                t if t == ElectionPhase::Tally as u8 => {
                    DecryptionMessage::from_bytes(payload).map(Message::Decryption)
                }
                _ => {
                    log::debug!("skipping message with unknown tag {tag}");
                    continue;
                }
            };
            match decoded {
                Ok(msg) => messages.push(msg),
                Err(e) => log::debug!("skipping unparseable message: {e}"),
            }
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voting::ballot::EncryptedBallot;

    fn sample_messages() -> Vec<Message> {
        let key = SigningKey::from_bytes(&[42u8; 32]);
        let cred = CredentialMessage::sign(vec![9u8; 32], &key, &[1u8; 32]);
        let ballot = SignedBallot {
            credential: vec![9u8; 32],
            signature: vec![7u8; 32],
            encrypted_ballot: EncryptedBallot {
                vdf_input: vec![3u8; 40],
                payload: vec![4u8; 20],
            },
        };
        let dec = DecryptionMessage::from_solution(&VdfSolution {
            input: vec![3u8; 40],
            output: vec![5u8; 16],
            proof: vec![6u8; 16],
        });
        vec![
            Message::Credential(cred),
            Message::Ballot(ballot),
            Message::Decryption(dec),
        ]
    }

    #[test]
    fn stream_roundtrip() {
        let messages = sample_messages();
        let mut stream = Vec::new();
        for msg in &messages {
            stream.extend_from_slice(&msg.to_bytes());
        }
        assert_eq!(Message::decode_stream(&stream).unwrap(), messages);
    }

    #[test]
    fn credential_signature_binds_election() {
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let msg = CredentialMessage::sign(vec![8u8; 32], &key, &[1u8; 32]);
        msg.verify(&[1u8; 32]).unwrap();
        assert!(msg.verify(&[2u8; 32]).is_err());
        let mut tampered = msg.clone();
        tampered.credential[0] ^= 1;
        assert!(tampered.verify(&[1u8; 32]).is_err());
    }

    #[test]
    fn unknown_tag_skipped() {
        let messages = sample_messages();
        let mut stream = Vec::new();
        stream.extend_from_slice(&messages[0].to_bytes());
        let mut w = BufferWriter::new();
        w.write_u8(200);
        w.write_vec(b"mystery payload");
        stream.extend_from_slice(&w.into_bytes());
        stream.extend_from_slice(&messages[2].to_bytes());

        let decoded = Message::decode_stream(&stream).unwrap();
        assert_eq!(decoded, vec![messages[0].clone(), messages[2].clone()]);
    }

    #[test]
    fn unparseable_payload_skipped() {
        let messages = sample_messages();
        let mut stream = Vec::new();
        let mut w = BufferWriter::new();
        w.write_u8(ElectionPhase::Tally as u8);
        w.write_vec(&[1, 2, 3]); // far too short for a decryption message
        stream.extend_from_slice(&w.into_bytes());
        stream.extend_from_slice(&messages[1].to_bytes());

        let decoded = Message::decode_stream(&stream).unwrap();
        assert_eq!(decoded, vec![messages[1].clone()]);
    }

    #[test]
    fn framing_error_aborts_decode() {
        let mut stream = sample_messages()[0].to_bytes();
        stream.push(ElectionPhase::Cast as u8);
        stream.push(0x90); // two-byte length prefix with no second byte
        assert!(Message::decode_stream(&stream).is_err());
    }
}
