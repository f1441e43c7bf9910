//! Security Descriptor Definition Language rendering
//!
//! Turns a parsed [`SecurityDescriptor`] into its SDDL text, e.g.
//! `O:DAG:DAD:PAI(A;CI;RPWP;;;AU)`.
//!
//! Well-known SIDs that do not depend on a domain are written with their
//! two-letter aliases. Domain-relative SIDs stay numeric since no domain
//! context is available at this layer.

use crate::ldap_utils::{
    ace_types, control_flags, parse_security_descriptor, AceEntry, Acl, SecurityDescriptor, Sid,
};

/// Two-letter aliases for well-known SIDs
const SID_ALIASES: &[(&str, &str)] = &[
    ("S-1-1-0", "WD"),
    ("S-1-3-0", "CO"),
    ("S-1-3-1", "CG"),
    ("S-1-3-4", "OW"),
    ("S-1-5-2", "NU"),
    ("S-1-5-4", "IU"),
    ("S-1-5-6", "SU"),
    ("S-1-5-7", "AN"),
    ("S-1-5-9", "ED"),
    ("S-1-5-10", "PS"),
    ("S-1-5-11", "AU"),
    ("S-1-5-12", "RC"),
    ("S-1-5-18", "SY"),
    ("S-1-5-19", "LS"),
    ("S-1-5-20", "NS"),
    ("S-1-5-33", "WR"),
    ("S-1-5-32-544", "BA"),
    ("S-1-5-32-545", "BU"),
    ("S-1-5-32-546", "BG"),
    ("S-1-5-32-547", "PU"),
    ("S-1-5-32-548", "AO"),
    ("S-1-5-32-549", "SO"),
    ("S-1-5-32-550", "PO"),
    ("S-1-5-32-551", "BO"),
    ("S-1-5-32-552", "RE"),
    ("S-1-5-32-554", "RU"),
    ("S-1-5-32-555", "RD"),
    ("S-1-5-32-556", "NO"),
    ("S-1-5-32-558", "MU"),
    ("S-1-5-32-559", "LU"),
    ("S-1-5-32-568", "IS"),
    ("S-1-5-32-569", "CY"),
    ("S-1-5-32-573", "ER"),
    ("S-1-5-32-574", "CD"),
    ("S-1-5-32-575", "RA"),
    ("S-1-5-32-576", "ES"),
    ("S-1-5-32-577", "MS"),
    ("S-1-5-32-578", "HA"),
    ("S-1-5-32-579", "AA"),
    ("S-1-5-32-580", "RM"),
    ("S-1-15-2-1", "AC"),
    ("S-1-16-4096", "LW"),
    ("S-1-16-8192", "ME"),
    ("S-1-16-8448", "MP"),
    ("S-1-16-12288", "HI"),
    ("S-1-16-16384", "SI"),
];

/// ACE flag aliases, in bit order
const ACE_FLAG_ALIASES: &[(u8, &str)] = &[
    (0x01, "OI"),
    (0x02, "CI"),
    (0x04, "NP"),
    (0x08, "IO"),
    (0x10, "ID"),
    (0x40, "SA"),
    (0x80, "FA"),
];

/// Access right aliases, in bit order
const RIGHT_ALIASES: &[(u32, &str)] = &[
    (0x0000_0001, "CC"),
    (0x0000_0002, "DC"),
    (0x0000_0004, "LC"),
    (0x0000_0008, "SW"),
    (0x0000_0010, "RP"),
    (0x0000_0020, "WP"),
    (0x0000_0040, "DT"),
    (0x0000_0080, "LO"),
    (0x0000_0100, "CR"),
    (0x0001_0000, "SD"),
    (0x0002_0000, "RC"),
    (0x0004_0000, "WD"),
    (0x0008_0000, "WO"),
    (0x1000_0000, "GA"),
    (0x2000_0000, "GX"),
    (0x4000_0000, "GW"),
    (0x8000_0000, "GR"),
];

/// Mandatory label ACE policy aliases, in bit order
const LABEL_POLICY_ALIASES: &[(u32, &str)] = &[
    (0x0000_0001, "NW"),
    (0x0000_0002, "NR"),
    (0x0000_0004, "NX"),
];

/// Parse a binary self-relative descriptor and render it as SDDL
pub fn sddl_from_bytes(bytes: &[u8]) -> Result<String, String> {
    let sd = parse_security_descriptor(bytes)?;
    to_sddl(&sd)
}

/// Render a parsed security descriptor as SDDL (owner, group, DACL, SACL)
pub fn to_sddl(sd: &SecurityDescriptor) -> Result<String, String> {
    let mut out = String::new();

    if let Some(owner) = &sd.owner_sid {
        out.push_str("O:");
        out.push_str(&sid_string(owner));
    }
    if let Some(group) = &sd.group_sid {
        out.push_str("G:");
        out.push_str(&sid_string(group));
    }

    // An ACL is only part of the descriptor when its PRESENT bit is set,
    // whatever its offset says.
    if sd.has_control(control_flags::SE_DACL_PRESENT) {
        push_acl_section(
            &mut out,
            sd,
            "D:",
            sd.dacl.as_ref(),
            [
                control_flags::SE_DACL_PROTECTED,
                control_flags::SE_DACL_AUTO_INHERIT_REQ,
                control_flags::SE_DACL_AUTO_INHERITED,
            ],
        )?;
    }
    if sd.has_control(control_flags::SE_SACL_PRESENT) {
        push_acl_section(
            &mut out,
            sd,
            "S:",
            sd.sacl.as_ref(),
            [
                control_flags::SE_SACL_PROTECTED,
                control_flags::SE_SACL_AUTO_INHERIT_REQ,
                control_flags::SE_SACL_AUTO_INHERITED,
            ],
        )?;
    }

    Ok(out)
}

fn push_acl_section(
    out: &mut String,
    sd: &SecurityDescriptor,
    prefix: &str,
    acl: Option<&Acl>,
    [protected, req, inherited]: [u16; 3],
) -> Result<(), String> {
    out.push_str(prefix);
    match acl {
        Some(acl) => {
            push_acl_flags(out, sd, protected, req, inherited);
            push_aces(out, acl)
        }
        None => {
            out.push_str("NO_ACCESS_CONTROL");
            Ok(())
        }
    }
}

fn push_acl_flags(out: &mut String, sd: &SecurityDescriptor, protected: u16, req: u16, inherited: u16) {
    if sd.has_control(protected) {
        out.push('P');
    }
    if sd.has_control(req) {
        out.push_str("AR");
    }
    if sd.has_control(inherited) {
        out.push_str("AI");
    }
}

fn push_aces(out: &mut String, acl: &Acl) -> Result<(), String> {
    for ace in &acl.aces {
        out.push_str(&ace_string(ace)?);
    }
    Ok(())
}

/// `(type;flags;rights;object_guid;inherit_object_guid;account_sid)`
pub fn ace_string(ace: &AceEntry) -> Result<String, String> {
    let mut out = String::from("(");
    out.push_str(ace_type_alias(ace.ace_type)?);
    out.push(';');
    out.push_str(&ace_flags_string(ace.ace_flags)?);
    out.push(';');
    if ace.ace_type == ace_types::SYSTEM_MANDATORY_LABEL {
        out.push_str(&label_policy_string(ace.access_mask));
    } else {
        out.push_str(&rights_string(ace.access_mask));
    }
    out.push(';');
    out.push_str(ace.object_guid.as_deref().unwrap_or_default());
    out.push(';');
    out.push_str(ace.inherited_object_guid.as_deref().unwrap_or_default());
    out.push(';');
    out.push_str(&sid_string(&ace.trustee_sid));
    out.push(')');
    Ok(out)
}

fn ace_type_alias(ace_type: u8) -> Result<&'static str, String> {
    match ace_type {
        ace_types::ACCESS_ALLOWED => Ok("A"),
        ace_types::ACCESS_DENIED => Ok("D"),
        ace_types::SYSTEM_AUDIT => Ok("AU"),
        ace_types::SYSTEM_ALARM => Ok("AL"),
        ace_types::ACCESS_ALLOWED_OBJECT => Ok("OA"),
        ace_types::ACCESS_DENIED_OBJECT => Ok("OD"),
        ace_types::SYSTEM_AUDIT_OBJECT => Ok("OU"),
        ace_types::SYSTEM_ALARM_OBJECT => Ok("OL"),
        ace_types::SYSTEM_MANDATORY_LABEL => Ok("ML"),
        other => Err(format!("No SDDL form for ACE type 0x{:02x}", other)),
    }
}

fn ace_flags_string(flags: u8) -> Result<String, String> {
    let known = ACE_FLAG_ALIASES.iter().fold(0u8, |acc, (bit, _)| acc | bit);
    if flags & !known != 0 {
        return Err(format!("Unknown ACE flags 0x{:02x}", flags));
    }
    Ok(ACE_FLAG_ALIASES
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, alias)| *alias)
        .collect())
}

/// Right aliases when every set bit has one, otherwise the mask in hex
pub fn rights_string(mask: u32) -> String {
    let known = RIGHT_ALIASES.iter().fold(0u32, |acc, (bit, _)| acc | bit);
    if mask == 0 || mask & !known != 0 {
        return format!("0x{:x}", mask);
    }
    RIGHT_ALIASES
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, alias)| *alias)
        .collect()
}

/// Mandatory label policy (`NW`, `NR`, `NX`), otherwise the mask in hex
pub fn label_policy_string(mask: u32) -> String {
    let known = LABEL_POLICY_ALIASES.iter().fold(0u32, |acc, (bit, _)| acc | bit);
    if mask == 0 || mask & !known != 0 {
        return format!("0x{:x}", mask);
    }
    LABEL_POLICY_ALIASES
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, alias)| *alias)
        .collect()
}

/// SID alias if well known, otherwise the `S-1-...` form
pub fn sid_string(sid: &Sid) -> String {
    let text = sid.to_string();
    SID_ALIASES
        .iter()
        .find(|(value, _)| *value == text)
        .map(|(_, alias)| alias.to_string())
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldap_utils::fixtures::*;

    #[test]
    fn test_rights_full_control() {
        assert_eq!(rights_string(0x000F_01FF), "CCDCLCSWRPWPDTLOCRSDRCWDWO");
    }

    #[test]
    fn test_rights_generic_and_read() {
        assert_eq!(rights_string(0x1000_0000), "GA");
        assert_eq!(rights_string(0x0002_0094), "LCRPLORC");
    }

    #[test]
    fn test_rights_unknown_bits_in_hex() {
        assert_eq!(rights_string(0x0010_0000), "0x100000");
        assert_eq!(rights_string(0x001F_01FF), "0x1f01ff");
        assert_eq!(rights_string(0), "0x0");
    }

    #[test]
    fn test_sid_aliases() {
        let system = crate::ldap_utils::parse_sid(&sid_bytes(5, &[18])).unwrap();
        assert_eq!(sid_string(&system), "SY");
        let admins = crate::ldap_utils::parse_sid(&sid_bytes(5, &[32, 544])).unwrap();
        assert_eq!(sid_string(&admins), "BA");
        let domain_admins =
            crate::ldap_utils::parse_sid(&sid_bytes(5, &[21, 1, 2, 3, 512])).unwrap();
        assert_eq!(sid_string(&domain_admins), "S-1-5-21-1-2-3-512");
    }

    #[test]
    fn test_full_descriptor() {
        let owner = sid_bytes(5, &[32, 544]);
        let group = sid_bytes(5, &[18]);
        let dacl = acl_bytes(&[
            ace_bytes(ace_types::ACCESS_ALLOWED, 0x02, 0x000F_01FF, &sid_bytes(5, &[18])),
            ace_bytes(ace_types::ACCESS_DENIED, 0, 0x0000_0100, &sid_bytes(1, &[0])),
        ]);
        let bytes = descriptor_bytes(
            control_flags::SE_DACL_PRESENT
                | control_flags::SE_DACL_PROTECTED
                | control_flags::SE_DACL_AUTO_INHERITED,
            Some(&owner),
            Some(&group),
            None,
            Some(&dacl),
        );

        assert_eq!(
            sddl_from_bytes(&bytes).unwrap(),
            "O:BAG:SYD:PAI(A;CI;CCDCLCSWRPWPDTLOCRSDRCWDWO;;;SY)(D;;CR;;;WD)"
        );
    }

    #[test]
    fn test_object_ace_and_sacl() {
        let guid = [
            0x14, 0xcc, 0x28, 0xbf, 0x14, 0x47, 0xd1, 0x11, 0x96, 0x60, 0x00, 0xc0, 0x4f, 0xb9,
            0x60, 0x50,
        ];
        let dacl = acl_bytes(&[object_ace_bytes(
            ace_types::ACCESS_ALLOWED_OBJECT,
            0x12,
            0x10,
            &guid,
            &sid_bytes(5, &[11]),
        )]);
        let sacl = acl_bytes(&[ace_bytes(ace_types::SYSTEM_AUDIT, 0x80, 0x20, &sid_bytes(1, &[0]))]);
        let bytes = descriptor_bytes(
            control_flags::SE_DACL_PRESENT | control_flags::SE_SACL_PRESENT,
            None,
            None,
            Some(&sacl),
            Some(&dacl),
        );

        assert_eq!(
            sddl_from_bytes(&bytes).unwrap(),
            "D:(OA;CIID;RP;bf28cc14-4714-11d1-9660-00c04fb96050;;AU)S:(AU;FA;WP;;;WD)"
        );
    }

    #[test]
    fn test_null_dacl() {
        let bytes = descriptor_bytes(control_flags::SE_DACL_PRESENT, None, None, None, None);
        assert_eq!(sddl_from_bytes(&bytes).unwrap(), "D:NO_ACCESS_CONTROL");
    }

    #[test]
    fn test_absent_dacl_and_empty_acl() {
        let bytes = descriptor_bytes(0, None, None, None, None);
        assert_eq!(sddl_from_bytes(&bytes).unwrap(), "");

        let dacl = acl_bytes(&[]);
        let bytes = descriptor_bytes(control_flags::SE_DACL_PRESENT, None, None, None, Some(&dacl));
        assert_eq!(sddl_from_bytes(&bytes).unwrap(), "D:");
    }

    #[test]
    fn test_acl_without_present_flag_is_ignored() {
        let owner = sid_bytes(5, &[18]);
        let empty = acl_bytes(&[]);
        let bytes = descriptor_bytes(0, Some(&owner), None, Some(&empty), Some(&empty));
        assert_eq!(sddl_from_bytes(&bytes).unwrap(), "O:SY");
    }

    #[test]
    fn test_null_sacl() {
        let bytes = descriptor_bytes(control_flags::SE_SACL_PRESENT, None, None, None, None);
        assert_eq!(sddl_from_bytes(&bytes).unwrap(), "S:NO_ACCESS_CONTROL");
    }

    #[test]
    fn test_mandatory_label_policy() {
        assert_eq!(label_policy_string(0x1), "NW");
        assert_eq!(label_policy_string(0x3), "NWNR");
        assert_eq!(label_policy_string(0x8), "0x8");

        let sacl = acl_bytes(&[ace_bytes(
            ace_types::SYSTEM_MANDATORY_LABEL,
            0,
            0x1,
            &sid_bytes(16, &[12288]),
        )]);
        let bytes = descriptor_bytes(control_flags::SE_SACL_PRESENT, None, None, Some(&sacl), None);
        assert_eq!(sddl_from_bytes(&bytes).unwrap(), "S:(ML;;NW;;;HI)");
    }

    #[test]
    fn test_unknown_ace_type_fails() {
        let dacl = acl_bytes(&[ace_bytes(0x09, 0, 0x10, &sid_bytes(5, &[18]))]);
        let bytes = descriptor_bytes(control_flags::SE_DACL_PRESENT, None, None, None, Some(&dacl));
        assert!(sddl_from_bytes(&bytes).is_err());
    }
}
