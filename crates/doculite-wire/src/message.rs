//! Request message parsing: OP_MSG sections and the legacy OP_QUERY.

use std::io::Read;

use bson::Document;

use crate::error::{WireError, WireResult};
use crate::header::MessageHeader;

/// Flag bit 0: a CRC-32C checksum trails the sections. The checksum is
/// skipped, not verified.
pub const FLAG_CHECKSUM_PRESENT: u32 = 1;
/// Flag bit 1: the sender does not expect a reply.
pub const FLAG_MORE_TO_COME: u32 = 1 << 1;

const SECTION_BODY: u8 = 0;
const SECTION_DOC_SEQUENCE: u8 = 1;

/// One OP_MSG section.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    /// Kind 0: a single document.
    Body(Document),
    /// Kind 1: an identified sequence of documents.
    DocumentSequence {
        /// Field of the body the documents belong to (e.g. `documents`).
        identifier: String,
        /// The documents of the sequence.
        documents: Vec<Document>,
    },
}

/// A parsed OP_MSG request.
#[derive(Debug, Clone, PartialEq)]
pub struct OpMsg {
    /// The message header.
    pub header: MessageHeader,
    /// Message flags.
    pub flag_bits: u32,
    /// Sections in wire order.
    pub sections: Vec<Section>,
}

impl OpMsg {
    /// Reads the body of an OP_MSG whose header was already consumed.
    pub fn read_from(reader: &mut impl Read, header: MessageHeader) -> WireResult<Self> {
        let body_length = header.body_length();
        if body_length < 5 {
            return Err(WireError::Malformed(format!(
                "OP_MSG body too short: {body_length}"
            )));
        }
        let mut buf = vec![0u8; body_length];
        reader.read_exact(&mut buf)?;

        let flag_bits = u32::from_le_bytes(buf[..4].try_into().expect("4-byte flag field"));
        let mut pos = 4;

        // With the checksum bit set the final four bytes are not a section.
        let mut end = buf.len();
        if flag_bits & FLAG_CHECKSUM_PRESENT != 0 {
            if end < pos + 4 {
                return Err(WireError::Truncated("checksum"));
            }
            end -= 4;
        }

        let mut sections = Vec::new();
        while pos < end {
            let kind = buf[pos];
            pos += 1;
            match kind {
                SECTION_BODY => {
                    let (document, consumed) = read_document(&buf[pos..end])?;
                    sections.push(Section::Body(document));
                    pos += consumed;
                }
                SECTION_DOC_SEQUENCE => {
                    let (section, consumed) = read_document_sequence(&buf[pos..end])?;
                    sections.push(section);
                    pos += consumed;
                }
                other => return Err(WireError::UnknownSectionKind(other)),
            }
        }

        Ok(Self {
            header,
            flag_bits,
            sections,
        })
    }

    /// True when the sender asked for no reply.
    pub fn more_to_come(&self) -> bool {
        self.flag_bits & FLAG_MORE_TO_COME != 0
    }

    /// Splits the sections into the single body document and the
    /// document-sequence sections. Exactly one body is required.
    pub fn into_parts(self) -> WireResult<(Document, Vec<(String, Vec<Document>)>)> {
        let mut body = None;
        let mut sequences = Vec::new();
        for section in self.sections {
            match section {
                Section::Body(document) => {
                    if body.is_some() {
                        return Err(WireError::Malformed(
                            "more than one body section".to_string(),
                        ));
                    }
                    body = Some(document);
                }
                Section::DocumentSequence {
                    identifier,
                    documents,
                } => sequences.push((identifier, documents)),
            }
        }
        match body {
            Some(body) => Ok((body, sequences)),
            None => Err(WireError::Malformed("missing body section".to_string())),
        }
    }
}

/// A parsed OP_QUERY request.
#[derive(Debug, Clone, PartialEq)]
pub struct OpQuery {
    /// The message header.
    pub header: MessageHeader,
    /// Query flags (ignored).
    pub flags: i32,
    /// Namespace, typically `<db>.$cmd` for handshake commands.
    pub full_collection_name: String,
    /// Documents to skip (ignored).
    pub number_to_skip: i32,
    /// Batch size hint (ignored).
    pub number_to_return: i32,
    /// The command document.
    pub query: Document,
}

impl OpQuery {
    /// Reads the body of an OP_QUERY whose header was already consumed.
    pub fn read_from(reader: &mut impl Read, header: MessageHeader) -> WireResult<Self> {
        let body_length = header.body_length();
        // flags + one-byte namespace + nul + skip + return
        if body_length < 13 {
            return Err(WireError::Malformed(format!(
                "OP_QUERY body too short: {body_length}"
            )));
        }
        let mut buf = vec![0u8; body_length];
        reader.read_exact(&mut buf)?;

        let flags = i32::from_le_bytes(buf[..4].try_into().expect("4-byte flag field"));
        let mut pos = 4;

        let nul = buf[pos..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(WireError::Truncated("collection name"))?;
        let full_collection_name = String::from_utf8(buf[pos..pos + nul].to_vec())
            .map_err(|e| WireError::Malformed(format!("collection name: {e}")))?;
        pos += nul + 1;

        if pos + 8 > buf.len() {
            return Err(WireError::Truncated("skip/return counts"));
        }
        let number_to_skip =
            i32::from_le_bytes(buf[pos..pos + 4].try_into().expect("4-byte count field"));
        let number_to_return = i32::from_le_bytes(
            buf[pos + 4..pos + 8].try_into().expect("4-byte count field"),
        );
        pos += 8;

        let (query, _) = read_document(&buf[pos..])?;

        Ok(Self {
            header,
            flags,
            full_collection_name,
            number_to_skip,
            number_to_return,
            query,
        })
    }

    /// The database prefix of the namespace (`admin` for `admin.$cmd`),
    /// falling back to `admin` when there is no prefix.
    pub fn database(&self) -> &str {
        match self.full_collection_name.split_once('.') {
            Some((db, _)) if !db.is_empty() => db,
            _ => "admin",
        }
    }
}

/// Reads one length-prefixed BSON document from the front of `buf`,
/// returning it with the number of bytes consumed.
fn read_document(buf: &[u8]) -> WireResult<(Document, usize)> {
    if buf.len() < 4 {
        return Err(WireError::Truncated("document length"));
    }
    let length = i32::from_le_bytes(buf[..4].try_into().expect("4-byte length field")) as usize;
    if length < 5 || length > buf.len() {
        return Err(WireError::Malformed(format!(
            "invalid document length {length} in {} remaining bytes",
            buf.len()
        )));
    }
    let document = Document::from_reader(&mut &buf[..length])
        .map_err(|e| WireError::Document(e.to_string()))?;
    Ok((document, length))
}

fn read_document_sequence(buf: &[u8]) -> WireResult<(Section, usize)> {
    if buf.len() < 4 {
        return Err(WireError::Truncated("document sequence size"));
    }
    // The size field covers itself.
    let size = i32::from_le_bytes(buf[..4].try_into().expect("4-byte size field")) as usize;
    if size < 5 || size > buf.len() {
        return Err(WireError::Malformed(format!(
            "invalid document sequence size {size} in {} remaining bytes",
            buf.len()
        )));
    }

    let mut pos = 4;
    let nul = buf[pos..size]
        .iter()
        .position(|&b| b == 0)
        .ok_or(WireError::Truncated("document sequence identifier"))?;
    let identifier = String::from_utf8(buf[pos..pos + nul].to_vec())
        .map_err(|e| WireError::Malformed(format!("sequence identifier: {e}")))?;
    pos += nul + 1;

    let mut documents = Vec::new();
    while pos < size {
        let (document, consumed) = read_document(&buf[pos..size])?;
        documents.push(document);
        pos += consumed;
    }

    Ok((
        Section::DocumentSequence {
            identifier,
            documents,
        },
        size,
    ))
}
