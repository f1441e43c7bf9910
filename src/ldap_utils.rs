//! LDAP Binary Attribute Utilities
//!
//! Parsers for the binary encodings Active Directory hands back in octet
//! string attributes: security identifiers, GUIDs, self-relative security
//! descriptors and FILETIME interval timestamps.
//!
//! Every parser returns `Result<_, String>`; callers decide on the fallback.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Security Identifiers (MS-DTYP 2.4.2)
// ============================================================================

/// Parsed binary security identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sid {
    pub revision: u8,
    pub authority: u64,
    pub sub_authorities: Vec<u32>,
}

/// Highest sub-authority count a valid SID may carry
pub const SID_MAX_SUB_AUTHORITIES: usize = 15;

impl Sid {
    /// Encoded size in bytes
    pub fn byte_len(&self) -> usize {
        8 + self.sub_authorities.len() * 4
    }
}

impl std::fmt::Display for Sid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Authorities that do not fit in 32 bits are written in hex
        if self.authority >= 1 << 32 {
            write!(f, "S-{}-0x{:012X}", self.revision, self.authority)?;
        } else {
            write!(f, "S-{}-{}", self.revision, self.authority)?;
        }
        for sub_auth in &self.sub_authorities {
            write!(f, "-{}", sub_auth)?;
        }
        Ok(())
    }
}

/// Parse a SID from the start of `bytes`; trailing data is ignored.
///
/// # Format (MS-DTYP 2.4.2):
/// ```text
/// Offset  Size  Field
/// 0       1     Revision
/// 1       1     SubAuthorityCount
/// 2       6     IdentifierAuthority (big-endian)
/// 8       4*N   SubAuthorities (little-endian)
/// ```
pub fn parse_sid_prefix(bytes: &[u8]) -> Result<Sid, String> {
    if bytes.len() < 8 {
        return Err("SID too short (minimum 8 bytes)".to_string());
    }

    let revision = bytes[0];
    if revision != 1 {
        return Err(format!("Unsupported SID revision {}", revision));
    }

    let sub_auth_count = bytes[1] as usize;
    if sub_auth_count > SID_MAX_SUB_AUTHORITIES {
        return Err(format!("Too many sub-authorities ({})", sub_auth_count));
    }

    if bytes.len() < 8 + (sub_auth_count * 4) {
        return Err(format!(
            "SID data insufficient for {} sub-authorities",
            sub_auth_count
        ));
    }

    let authority = u64::from_be_bytes([
        0, 0, bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]);

    let sub_authorities = bytes[8..8 + sub_auth_count * 4]
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(Sid {
        revision,
        authority,
        sub_authorities,
    })
}

/// Parse a standalone binary SID. The buffer must hold exactly one SID.
pub fn parse_sid(bytes: &[u8]) -> Result<Sid, String> {
    let sid = parse_sid_prefix(bytes)?;
    if sid.byte_len() != bytes.len() {
        return Err(format!(
            "SID length mismatch: {} bytes for {} sub-authorities",
            bytes.len(),
            sid.sub_authorities.len()
        ));
    }
    Ok(sid)
}

/// Convert a standalone binary SID to string format (S-1-5-21-...)
pub fn sid_to_string(bytes: &[u8]) -> Result<String, String> {
    parse_sid(bytes).map(|sid| sid.to_string())
}

// ============================================================================
// GUIDs (MS-DTYP 2.3.4.2)
// ============================================================================

/// Convert a binary GUID to its hyphenated lowercase form.
///
/// Data1..Data3 are stored little-endian, Data4 as-is.
pub fn guid_to_string(bytes: &[u8]) -> Result<String, String> {
    Uuid::from_slice_le(bytes)
        .map(|guid| guid.hyphenated().to_string())
        .map_err(|e| format!("Invalid GUID: {}", e))
}

/// Uppercase hex of the raw bytes, no separators
pub fn to_hex_upper(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

// ============================================================================
// FILETIME interval timestamps
// ============================================================================

/// 100-ns intervals between 1601-01-01 and 1970-01-01
pub const WINDOWS_EPOCH_DIFF: i64 = 116_444_736_000_000_000;

const TICKS_PER_SECOND: i64 = 10_000_000;

/// Convert a FILETIME value (100-ns ticks since 1601-01-01 UTC) to a UTC instant.
///
/// Negative values and instants past year 9999 are rejected.
pub fn filetime_to_datetime(filetime: i64) -> Result<DateTime<Utc>, String> {
    if filetime < 0 {
        return Err(format!("Negative filetime {}", filetime));
    }

    let unix_100ns = filetime - WINDOWS_EPOCH_DIFF;
    let unix_seconds = unix_100ns.div_euclid(TICKS_PER_SECOND);
    let nanos = (unix_100ns.rem_euclid(TICKS_PER_SECOND) * 100) as u32;

    let dt = DateTime::from_timestamp(unix_seconds, nanos)
        .ok_or_else(|| format!("Filetime {} out of range", filetime))?;

    if dt.year() > 9999 {
        return Err(format!("Filetime {} beyond year 9999", filetime));
    }

    Ok(dt)
}

// ============================================================================
// Security Descriptor Parsing (MS-DTYP)
// ============================================================================

/// Security descriptor control flags (MS-DTYP 2.4.6)
pub mod control_flags {
    pub const SE_DACL_PRESENT: u16 = 0x0004;
    pub const SE_SACL_PRESENT: u16 = 0x0010;
    pub const SE_DACL_AUTO_INHERIT_REQ: u16 = 0x0100;
    pub const SE_SACL_AUTO_INHERIT_REQ: u16 = 0x0200;
    pub const SE_DACL_AUTO_INHERITED: u16 = 0x0400;
    pub const SE_SACL_AUTO_INHERITED: u16 = 0x0800;
    pub const SE_DACL_PROTECTED: u16 = 0x1000;
    pub const SE_SACL_PROTECTED: u16 = 0x2000;
    pub const SE_SELF_RELATIVE: u16 = 0x8000;
}

/// ACE Type constants (MS-DTYP 2.4.4.1)
pub mod ace_types {
    pub const ACCESS_ALLOWED: u8 = 0x00;
    pub const ACCESS_DENIED: u8 = 0x01;
    pub const SYSTEM_AUDIT: u8 = 0x02;
    pub const SYSTEM_ALARM: u8 = 0x03;
    pub const ACCESS_ALLOWED_OBJECT: u8 = 0x05;
    pub const ACCESS_DENIED_OBJECT: u8 = 0x06;
    pub const SYSTEM_AUDIT_OBJECT: u8 = 0x07;
    pub const SYSTEM_ALARM_OBJECT: u8 = 0x08;
    pub const SYSTEM_MANDATORY_LABEL: u8 = 0x11;
}

/// Object ACE flags: which GUIDs follow the access mask
const ACE_OBJECT_TYPE_PRESENT: u32 = 0x01;
const ACE_INHERITED_OBJECT_TYPE_PRESENT: u32 = 0x02;

/// Windows Security Descriptor in self-relative form (MS-DTYP 2.4.6)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityDescriptor {
    pub revision: u8,
    pub control_flags: u16,
    pub owner_sid: Option<Sid>,
    pub group_sid: Option<Sid>,
    /// `None` when the ACL offset is zero
    pub dacl: Option<Acl>,
    pub sacl: Option<Acl>,
}

impl SecurityDescriptor {
    pub fn has_control(&self, flag: u16) -> bool {
        self.control_flags & flag != 0
    }
}

/// Access Control List
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acl {
    pub revision: u8,
    pub aces: Vec<AceEntry>,
}

/// Access Control Entry in a DACL or SACL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AceEntry {
    pub ace_type: u8,
    pub ace_flags: u8,
    pub access_mask: u32,
    pub trustee_sid: Sid,
    pub object_guid: Option<String>,
    pub inherited_object_guid: Option<String>,
}

impl AceEntry {
    pub fn is_object_ace(&self) -> bool {
        is_object_ace_type(self.ace_type)
    }
}

fn is_object_ace_type(ace_type: u8) -> bool {
    matches!(
        ace_type,
        ace_types::ACCESS_ALLOWED_OBJECT
            | ace_types::ACCESS_DENIED_OBJECT
            | ace_types::SYSTEM_AUDIT_OBJECT
            | ace_types::SYSTEM_ALARM_OBJECT
    )
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Parse a self-relative security descriptor from `nTSecurityDescriptor`
///
/// # Format (MS-DTYP 2.4.6):
/// ```text
/// Offset  Size  Field
/// 0       1     Revision
/// 1       1     Sbz1 (padding)
/// 2       2     Control flags
/// 4       4     Owner SID offset
/// 8       4     Group SID offset
/// 12      4     SACL offset
/// 16      4     DACL offset
/// ```
pub fn parse_security_descriptor(bytes: &[u8]) -> Result<SecurityDescriptor, String> {
    if bytes.len() < 20 {
        return Err("Security descriptor too short (minimum 20 bytes)".to_string());
    }

    let revision = bytes[0];
    if revision != 1 {
        return Err(format!("Unsupported security descriptor revision {}", revision));
    }

    let control_flags = read_u16(bytes, 2);
    if control_flags & control_flags::SE_SELF_RELATIVE == 0 {
        return Err("Security descriptor is not self-relative".to_string());
    }

    let owner_offset = read_u32(bytes, 4) as usize;
    let group_offset = read_u32(bytes, 8) as usize;
    let sacl_offset = read_u32(bytes, 12) as usize;
    let dacl_offset = read_u32(bytes, 16) as usize;

    let owner_sid = section(bytes, owner_offset, "owner")?
        .map(parse_sid_prefix)
        .transpose()?;
    let group_sid = section(bytes, group_offset, "group")?
        .map(parse_sid_prefix)
        .transpose()?;
    let dacl = section(bytes, dacl_offset, "DACL")?
        .map(parse_acl)
        .transpose()?;
    let sacl = section(bytes, sacl_offset, "SACL")?
        .map(parse_acl)
        .transpose()?;

    Ok(SecurityDescriptor {
        revision,
        control_flags,
        owner_sid,
        group_sid,
        dacl,
        sacl,
    })
}

/// Slice from a header offset; zero means the section is absent
fn section<'a>(bytes: &'a [u8], offset: usize, what: &str) -> Result<Option<&'a [u8]>, String> {
    match offset {
        0 => Ok(None),
        o if o < 20 || o >= bytes.len() => Err(format!("{} offset {} out of bounds", what, o)),
        o => Ok(Some(&bytes[o..])),
    }
}

/// Parse an Access Control List from binary format
///
/// # Format (MS-DTYP 2.4.5):
/// ```text
/// Offset  Size  Field
/// 0       1     Revision
/// 1       1     Sbz1 (padding)
/// 2       2     ACL size
/// 4       2     ACE count
/// 6       2     Sbz2 (padding)
/// 8       ...   ACE entries
/// ```
fn parse_acl(bytes: &[u8]) -> Result<Acl, String> {
    if bytes.len() < 8 {
        return Err("ACL too short (minimum 8 bytes)".to_string());
    }

    let revision = bytes[0];
    let acl_size = read_u16(bytes, 2) as usize;
    let ace_count = read_u16(bytes, 4) as usize;

    if acl_size < 8 || acl_size > bytes.len() {
        return Err(format!("ACL size {} out of bounds", acl_size));
    }

    let bytes = &bytes[..acl_size];
    let mut aces = Vec::with_capacity(ace_count);
    let mut offset = 8;

    for index in 0..ace_count {
        if offset + 4 > bytes.len() {
            return Err(format!("ACE {} header truncated", index));
        }

        let ace_size = read_u16(bytes, offset + 2) as usize;
        if ace_size < 4 || offset + ace_size > bytes.len() {
            return Err(format!("ACE {} size {} out of bounds", index, ace_size));
        }

        aces.push(parse_ace(&bytes[offset..offset + ace_size])?);
        offset += ace_size;
    }

    Ok(Acl { revision, aces })
}

/// Parse a single ACE from binary format
fn parse_ace(data: &[u8]) -> Result<AceEntry, String> {
    if data.len() < 16 {
        return Err("ACE too short".to_string());
    }

    // header: type(1) + flags(1) + size(2), then access_mask(4)
    let ace_type = data[0];
    let ace_flags = data[1];
    let access_mask = read_u32(data, 4);

    let (trustee_sid, object_guid, inherited_object_guid) = if is_object_ace_type(ace_type) {
        // object flags(4) + [object_guid(16)] + [inherited_guid(16)] + SID
        let object_flags = read_u32(data, 8);
        let mut sid_offset = 12;

        let obj_guid = if object_flags & ACE_OBJECT_TYPE_PRESENT != 0 {
            let guid = guid_at(data, sid_offset)?;
            sid_offset += 16;
            Some(guid)
        } else {
            None
        };

        let inh_guid = if object_flags & ACE_INHERITED_OBJECT_TYPE_PRESENT != 0 {
            let guid = guid_at(data, sid_offset)?;
            sid_offset += 16;
            Some(guid)
        } else {
            None
        };

        let sid = parse_sid_prefix(data.get(sid_offset..).unwrap_or_default())?;
        (sid, obj_guid, inh_guid)
    } else {
        (parse_sid_prefix(&data[8..])?, None, None)
    };

    Ok(AceEntry {
        ace_type,
        ace_flags,
        access_mask,
        trustee_sid,
        object_guid,
        inherited_object_guid,
    })
}

fn guid_at(data: &[u8], offset: usize) -> Result<String, String> {
    data.get(offset..offset + 16)
        .ok_or_else(|| "Object ACE GUID truncated".to_string())
        .and_then(guid_to_string)
}

/// Test fixtures shared with the SDDL renderer tests
#[cfg(test)]
pub(crate) mod fixtures {
    /// Encode a SID (revision 1) from authority and sub-authorities
    pub fn sid_bytes(authority: u64, subs: &[u32]) -> Vec<u8> {
        let mut out = vec![1u8, subs.len() as u8];
        out.extend_from_slice(&authority.to_be_bytes()[2..]);
        for sub in subs {
            out.extend_from_slice(&sub.to_le_bytes());
        }
        out
    }

    /// Encode a plain (non-object) ACE
    pub fn ace_bytes(ace_type: u8, flags: u8, mask: u32, sid: &[u8]) -> Vec<u8> {
        let size = (8 + sid.len()) as u16;
        let mut out = vec![ace_type, flags];
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&mask.to_le_bytes());
        out.extend_from_slice(sid);
        out
    }

    /// Encode an object ACE carrying an object-type GUID
    pub fn object_ace_bytes(ace_type: u8, flags: u8, mask: u32, guid: &[u8; 16], sid: &[u8]) -> Vec<u8> {
        let size = (12 + 16 + sid.len()) as u16;
        let mut out = vec![ace_type, flags];
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&mask.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(guid);
        out.extend_from_slice(sid);
        out
    }

    pub fn acl_bytes(aces: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = aces.concat();
        let size = (8 + body.len()) as u16;
        let mut out = vec![2u8, 0];
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&(aces.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&body);
        out
    }

    /// Self-relative descriptor laid out as header, owner, group, SACL, DACL
    pub fn descriptor_bytes(
        control: u16,
        owner: Option<&[u8]>,
        group: Option<&[u8]>,
        sacl: Option<&[u8]>,
        dacl: Option<&[u8]>,
    ) -> Vec<u8> {
        let mut body = Vec::new();
        let mut offsets = [0u32; 4];
        for (slot, part) in [owner, group, sacl, dacl].into_iter().enumerate() {
            if let Some(part) = part {
                offsets[slot] = (20 + body.len()) as u32;
                body.extend_from_slice(part);
            }
        }
        let mut out = vec![1u8, 0];
        out.extend_from_slice(&(control | 0x8000).to_le_bytes());
        for offset in offsets {
            out.extend_from_slice(&offset.to_le_bytes());
        }
        out.extend_from_slice(&body);
        out
    }
}
