//! Confirmation votes (`confirm_ack`)

use rai_crypto::{blake2b_256, verify_signature, RaiKeyPair};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;

use crate::error::{ParseError, ParseResult};
use crate::protocol::message::{parse_block_message, Body};
use crate::protocol::{
    Block, Header, MessageType, ACCOUNT_LENGTH, SEQUENCE_LENGTH, SIGNATURE_LENGTH,
};

/// How much of a `confirm_ack` to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteMode {
    /// Stop after the voting account; no hashing or signature work.
    /// Consumers that need authenticity must re-parse in [`VoteMode::Full`].
    #[default]
    AccountOnly,
    /// Decode the block and verify the vote signature.
    Full,
}

/// A representative's signed vote for a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub account: [u8; ACCOUNT_LENGTH],
    pub signature: [u8; SIGNATURE_LENGTH],
    /// Sequence number exactly as carried on the wire (little-endian).
    pub sequence: [u8; SEQUENCE_LENGTH],
    pub block: Block,
}

impl Vote {
    /// Vote for `block` as the account of `keypair`
    pub fn sign(block: Block, sequence: u64, keypair: &RaiKeyPair) -> Self {
        let sequence = sequence.to_le_bytes();
        let digest = blake2b_256(&[block.hash().as_bytes(), &sequence]);
        Vote {
            account: keypair.public_key(),
            signature: keypair.sign(&digest),
            sequence,
            block,
        }
    }

    pub fn sequence(&self) -> u64 {
        u64::from_le_bytes(self.sequence)
    }

    /// The signed message: `blake2b_256(hash(block) || sequence)`
    pub fn digest(&self) -> [u8; 32] {
        blake2b_256(&[self.block.hash().as_bytes(), &self.sequence])
    }

    pub fn verify(&self) -> ParseResult<()> {
        verify_signature(&self.account, &self.digest(), &self.signature)
            .map_err(|_| ParseError::SignatureInvalid)
    }

    /// `account || signature || sequence || block`
    pub fn to_bytes(&self) -> Vec<u8> {
        let block = self.block.to_bytes();
        let mut bytes =
            Vec::with_capacity(ACCOUNT_LENGTH + SIGNATURE_LENGTH + SEQUENCE_LENGTH + block.len());
        bytes.extend_from_slice(&self.account);
        bytes.extend_from_slice(&self.signature);
        bytes.extend_from_slice(&self.sequence);
        bytes.extend_from_slice(&block);
        bytes
    }
}

impl Serialize for Vote {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Vote", 4)?;
        state.serialize_field("account", &hex::encode_upper(self.account))?;
        state.serialize_field("signature", &hex::encode_upper(self.signature))?;
        state.serialize_field("sequence", &self.sequence())?;
        state.serialize_field("block", &self.block)?;
        state.end()
    }
}

/// Decode a `confirm_ack` body according to `mode`.
pub(crate) fn parse_confirm_ack(header: &Header, body: &[u8], mode: VoteMode) -> ParseResult<Body> {
    if body.len() < ACCOUNT_LENGTH {
        return Err(ParseError::Truncated {
            needed: ACCOUNT_LENGTH,
            available: body.len(),
        });
    }
    let mut account = [0u8; ACCOUNT_LENGTH];
    account.copy_from_slice(&body[..ACCOUNT_LENGTH]);

    if mode == VoteMode::AccountOnly {
        return Ok(Body::VoteAccount {
            account,
            rest: body[ACCOUNT_LENGTH..].to_vec(),
        });
    }

    let block_offset = ACCOUNT_LENGTH + SIGNATURE_LENGTH + SEQUENCE_LENGTH;
    if body.len() < block_offset {
        return Err(ParseError::Truncated {
            needed: block_offset,
            available: body.len(),
        });
    }
    let mut signature = [0u8; SIGNATURE_LENGTH];
    signature.copy_from_slice(&body[ACCOUNT_LENGTH..ACCOUNT_LENGTH + SIGNATURE_LENGTH]);
    let mut sequence = [0u8; SEQUENCE_LENGTH];
    sequence.copy_from_slice(&body[ACCOUNT_LENGTH + SIGNATURE_LENGTH..block_offset]);

    // The trailing block is a publish body under the same extensions.
    let synthetic = Header {
        message_type: MessageType::Publish,
        ..*header
    };
    let mut framed = synthetic.to_bytes().to_vec();
    framed.extend_from_slice(&body[block_offset..]);
    let (_, block) = parse_block_message(&framed)?;

    let vote = Vote {
        account,
        signature,
        sequence,
        block,
    };
    vote.verify()?;
    Ok(Body::Vote(vote))
}
