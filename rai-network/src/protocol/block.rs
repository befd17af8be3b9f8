//! Block variants, their fixed field layouts and content hashing

use std::collections::HashMap;
use std::fmt;

use rai_crypto::{blake2b_256, verify_signature, CryptoResult, RaiKeyPair};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{ParseError, ParseResult};
use crate::protocol::{BlockType, ACCOUNT_LENGTH, SIGNATURE_LENGTH, WORK_LENGTH};

/// A named, fixed-length block field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Previous,
    Destination,
    Balance,
    Source,
    Representative,
    Account,
    Link,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Previous => "previous",
            Field::Destination => "destination",
            Field::Balance => "balance",
            Field::Source => "source",
            Field::Representative => "representative",
            Field::Account => "account",
            Field::Link => "link",
        }
    }

    /// Number of bytes the field occupies on the wire
    pub fn byte_len(&self) -> usize {
        match self {
            Field::Balance => 16,
            _ => 32,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which block types require each field, in declaration order.
const FIELD_TABLE: [(Field, &[BlockType]); 7] = [
    (
        Field::Previous,
        &[BlockType::Send, BlockType::Receive, BlockType::Change, BlockType::State],
    ),
    (Field::Destination, &[BlockType::Send]),
    (Field::Balance, &[BlockType::Send, BlockType::State]),
    (Field::Source, &[BlockType::Receive, BlockType::Open]),
    (
        Field::Representative,
        &[BlockType::Open, BlockType::Change, BlockType::State],
    ),
    (Field::Account, &[BlockType::Open, BlockType::State]),
    (Field::Link, &[BlockType::State]),
];

/// State blocks are laid out and hashed in this order, not the table's.
const STATE_FIELD_ORDER: [Field; 5] = [
    Field::Account,
    Field::Previous,
    Field::Representative,
    Field::Balance,
    Field::Link,
];

/// Ordered fields of `block_type`, as serialized and hashed.
pub fn fields_for(block_type: BlockType) -> Vec<Field> {
    if block_type == BlockType::State {
        return STATE_FIELD_ORDER.to_vec();
    }
    FIELD_TABLE
        .iter()
        .filter(|(_, types)| types.contains(&block_type))
        .map(|(field, _)| *field)
        .collect()
}

/// Loosely-typed field input for [`Block::encode`].
pub type FieldValues = HashMap<Field, Vec<u8>>;

/// Content hash of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for BlockHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Proof-of-work value, held in canonical big-endian order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Work(pub [u8; WORK_LENGTH]);

impl Work {
    /// Wrap exactly eight canonical bytes
    pub fn from_slice(bytes: &[u8]) -> ParseResult<Self> {
        let work: [u8; WORK_LENGTH] = bytes.try_into().map_err(|_| ParseError::LengthMismatch {
            field: "work",
            expected: WORK_LENGTH,
            actual: bytes.len(),
        })?;
        Ok(Work(work))
    }

    pub fn from_u64(value: u64) -> Self {
        Work(value.to_be_bytes())
    }

    pub fn value(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// State blocks carry work big-endian, the legacy variants little-endian.
    pub fn to_wire(&self, block_type: BlockType) -> [u8; WORK_LENGTH] {
        let mut wire = self.0;
        if block_type != BlockType::State {
            wire.reverse();
        }
        wire
    }

    pub fn from_wire(block_type: BlockType, mut wire: [u8; WORK_LENGTH]) -> Self {
        if block_type != BlockType::State {
            wire.reverse();
        }
        Work(wire)
    }
}

impl fmt::Display for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendBlock {
    pub previous: [u8; 32],
    pub destination: [u8; 32],
    pub balance: [u8; 16],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveBlock {
    pub previous: [u8; 32],
    pub source: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenBlock {
    pub source: [u8; 32],
    pub representative: [u8; 32],
    pub account: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBlock {
    pub previous: [u8; 32],
    pub representative: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBlock {
    pub account: [u8; 32],
    pub previous: [u8; 32],
    pub representative: [u8; 32],
    pub balance: [u8; 16],
    pub link: [u8; 32],
}

/// The hashed part of a block: exactly the fields of its variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockContents {
    Send(SendBlock),
    Receive(ReceiveBlock),
    Open(OpenBlock),
    Change(ChangeBlock),
    State(StateBlock),
}

/// Sequential reader over a field section whose total length was already checked.
struct FieldReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    fn take<const N: usize>(&mut self) -> ParseResult<[u8; N]> {
        let end = self.offset + N;
        let slice = self.bytes.get(self.offset..end).ok_or(ParseError::Truncated {
            needed: end,
            available: self.bytes.len(),
        })?;
        self.offset = end;
        slice.try_into().map_err(|_| ParseError::Truncated {
            needed: end,
            available: self.bytes.len(),
        })
    }
}

impl BlockContents {
    pub fn block_type(&self) -> BlockType {
        match self {
            BlockContents::Send(_) => BlockType::Send,
            BlockContents::Receive(_) => BlockType::Receive,
            BlockContents::Open(_) => BlockType::Open,
            BlockContents::Change(_) => BlockType::Change,
            BlockContents::State(_) => BlockType::State,
        }
    }

    /// Bytes of `field`, or `None` when this variant has no such field
    pub fn field(&self, field: Field) -> Option<&[u8]> {
        let bytes: &[u8] = match (self, field) {
            (BlockContents::Send(b), Field::Previous) => &b.previous,
            (BlockContents::Send(b), Field::Destination) => &b.destination,
            (BlockContents::Send(b), Field::Balance) => &b.balance,
            (BlockContents::Receive(b), Field::Previous) => &b.previous,
            (BlockContents::Receive(b), Field::Source) => &b.source,
            (BlockContents::Open(b), Field::Source) => &b.source,
            (BlockContents::Open(b), Field::Representative) => &b.representative,
            (BlockContents::Open(b), Field::Account) => &b.account,
            (BlockContents::Change(b), Field::Previous) => &b.previous,
            (BlockContents::Change(b), Field::Representative) => &b.representative,
            (BlockContents::State(b), Field::Account) => &b.account,
            (BlockContents::State(b), Field::Previous) => &b.previous,
            (BlockContents::State(b), Field::Representative) => &b.representative,
            (BlockContents::State(b), Field::Balance) => &b.balance,
            (BlockContents::State(b), Field::Link) => &b.link,
            _ => return None,
        };
        Some(bytes)
    }

    /// Field slices in wire order
    pub fn ordered_fields(&self) -> Vec<(Field, &[u8])> {
        fields_for(self.block_type())
            .into_iter()
            .filter_map(|field| self.field(field).map(|bytes| (field, bytes)))
            .collect()
    }

    /// Concatenated field section
    pub fn to_bytes(&self) -> Vec<u8> {
        self.ordered_fields()
            .into_iter()
            .flat_map(|(_, bytes)| bytes.iter().copied())
            .collect()
    }

    /// Blake2b-256 over the ordered fields
    pub fn hash(&self) -> BlockHash {
        let parts: Vec<&[u8]> = self
            .ordered_fields()
            .into_iter()
            .map(|(_, bytes)| bytes)
            .collect();
        BlockHash(blake2b_256(&parts))
    }

    /// Build contents from loosely-typed field values, checking presence and lengths.
    pub fn from_fields(block_type: BlockType, values: &FieldValues) -> ParseResult<Self> {
        let block_type = block_type.require_block()?;
        let mut body = Vec::new();
        for field in fields_for(block_type) {
            let value = values
                .get(&field)
                .ok_or(ParseError::MissingField(field.name()))?;
            if value.len() != field.byte_len() {
                return Err(ParseError::LengthMismatch {
                    field: field.name(),
                    expected: field.byte_len(),
                    actual: value.len(),
                });
            }
            body.extend_from_slice(value);
        }
        Self::from_body(block_type, &body)
    }

    /// Slice a field section of exactly `block_type.body_len()` bytes.
    pub fn from_body(block_type: BlockType, body: &[u8]) -> ParseResult<Self> {
        let expected = block_type
            .body_len()
            .ok_or(ParseError::InvalidBlockType(block_type as u8))?;
        if body.len() != expected {
            return Err(ParseError::InvalidBlockLength {
                expected,
                actual: body.len(),
            });
        }

        // Struct literal fields are evaluated in source order, which is wire order.
        let mut r = FieldReader { bytes: body, offset: 0 };
        let contents = match block_type {
            BlockType::Send => BlockContents::Send(SendBlock {
                previous: r.take()?,
                destination: r.take()?,
                balance: r.take()?,
            }),
            BlockType::Receive => BlockContents::Receive(ReceiveBlock {
                previous: r.take()?,
                source: r.take()?,
            }),
            BlockType::Open => BlockContents::Open(OpenBlock {
                source: r.take()?,
                representative: r.take()?,
                account: r.take()?,
            }),
            BlockType::Change => BlockContents::Change(ChangeBlock {
                previous: r.take()?,
                representative: r.take()?,
            }),
            BlockType::State => BlockContents::State(StateBlock {
                account: r.take()?,
                previous: r.take()?,
                representative: r.take()?,
                balance: r.take()?,
                link: r.take()?,
            }),
            BlockType::Invalid | BlockType::NotABlock => {
                return Err(ParseError::InvalidBlockType(block_type as u8))
            }
        };
        Ok(contents)
    }
}

/// A block with its signature, work and computed hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    contents: BlockContents,
    signature: Option<[u8; SIGNATURE_LENGTH]>,
    work: Work,
    hash: BlockHash,
}

impl Block {
    /// Create an unsigned block
    pub fn new(contents: BlockContents, work: Work) -> Self {
        let hash = contents.hash();
        Self {
            contents,
            signature: None,
            work,
            hash,
        }
    }

    /// Build a block from loosely-typed input.
    ///
    /// An explicit `signature` wins over `signer`; with neither the block is
    /// left unsigned.
    pub fn encode(
        block_type: BlockType,
        values: &FieldValues,
        signature: Option<[u8; SIGNATURE_LENGTH]>,
        work: &[u8],
        signer: Option<&RaiKeyPair>,
    ) -> ParseResult<Self> {
        let contents = BlockContents::from_fields(block_type, values)?;
        let work = Work::from_slice(work)?;
        let mut block = Block::new(contents, work);
        match (signature, signer) {
            (Some(signature), _) => block.signature = Some(signature),
            (None, Some(keypair)) => block.sign(keypair),
            (None, None) => {}
        }
        Ok(block)
    }

    /// Decode `fields || signature || work` for a known block type.
    ///
    /// The signature is not checked.
    pub fn decode(bytes: &[u8], block_type: BlockType) -> ParseResult<Self> {
        let body_len = block_type
            .body_len()
            .ok_or(ParseError::InvalidBlockType(block_type as u8))?;
        let expected = body_len + SIGNATURE_LENGTH + WORK_LENGTH;
        if bytes.len() != expected {
            return Err(ParseError::InvalidBlockLength {
                expected,
                actual: bytes.len(),
            });
        }

        let (body, rest) = bytes.split_at(body_len);
        let (signature, work) = rest.split_at(SIGNATURE_LENGTH);
        let contents = BlockContents::from_body(block_type, body)?;
        let mut block = Block::new(
            contents,
            Work::from_wire(block_type, Work::from_slice(work)?.0),
        );
        if signature.iter().any(|b| *b != 0) {
            let mut sig = [0u8; SIGNATURE_LENGTH];
            sig.copy_from_slice(signature);
            block.signature = Some(sig);
        }
        Ok(block)
    }

    /// Serialize to `fields || signature || work`. Unsigned blocks carry a zero signature.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.contents.to_bytes();
        bytes.extend_from_slice(&self.signature.unwrap_or([0u8; SIGNATURE_LENGTH]));
        bytes.extend_from_slice(&self.work.to_wire(self.block_type()));
        bytes
    }

    /// Sign the block hash with `keypair`, replacing any signature
    pub fn sign(&mut self, keypair: &RaiKeyPair) {
        self.signature = Some(keypair.sign(self.hash.as_bytes()));
    }

    pub fn with_signature(mut self, signature: [u8; SIGNATURE_LENGTH]) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Check the signature against a known signer.
    ///
    /// Legacy blocks do not name their signer, so the caller supplies it.
    pub fn verify_signature(&self, account: &[u8; ACCOUNT_LENGTH]) -> CryptoResult<()> {
        let signature = self
            .signature
            .ok_or(rai_crypto::CryptoError::InvalidSignature)?;
        verify_signature(account, self.hash.as_bytes(), &signature)
    }

    pub fn block_type(&self) -> BlockType {
        self.contents.block_type()
    }

    pub fn contents(&self) -> &BlockContents {
        &self.contents
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn signature(&self) -> Option<&[u8; SIGNATURE_LENGTH]> {
        self.signature.as_ref()
    }

    pub fn work(&self) -> Work {
        self.work
    }

    pub fn previous(&self) -> Option<&[u8]> {
        self.contents.field(Field::Previous)
    }

    pub fn account(&self) -> Option<&[u8]> {
        self.contents.field(Field::Account)
    }
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.contents.ordered_fields();
        let mut map = serializer.serialize_map(Some(fields.len() + 4))?;
        map.serialize_entry("type", &self.block_type())?;
        map.serialize_entry("hash", &self.hash)?;
        for (field, bytes) in fields {
            map.serialize_entry(field.name(), &hex::encode_upper(bytes))?;
        }
        map.serialize_entry("signature", &self.signature.map(hex::encode_upper))?;
        map.serialize_entry("work", &self.work.to_string())?;
        map.end()
    }
}
