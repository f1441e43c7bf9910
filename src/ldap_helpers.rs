//! LDAP Helper Utilities
//!
//! Boundary between the directory client and the decoder: turns an
//! `ldap3::SearchEntry` into a classified [`AttributeRecord`].

use chrono::{NaiveDateTime, TimeZone, Utc};
use ldap3::SearchEntry;
use tracing::debug;

use crate::attribute_value::{AttributeRecord, HighLowPair, RawValue};

/// Common LDAP attribute name constants
pub mod attrs {
    // Naming attributes used for the record header
    pub const CN: &str = "cn";
    pub const OU: &str = "ou";
    pub const NAME: &str = "name";

    // Identity attributes
    pub const OBJECT_SID: &str = "objectSid";
    pub const OBJECT_GUID: &str = "objectGUID";
    pub const SID_HISTORY: &str = "sIDHistory";
    pub const TOKEN_GROUPS: &str = "tokenGroups";
    pub const SECURITY_IDENTIFIER: &str = "securityIdentifier";
    pub const CREATOR_SID: &str = "mS-DS-CreatorSID";

    // Security attributes
    pub const NT_SECURITY_DESCRIPTOR: &str = "nTSecurityDescriptor";
    pub const MS_DS_ALLOWED_TO_ACT_ON_BEHALF: &str = "msDS-AllowedToActOnBehalfOfOtherIdentity";
}

/// Attributes always carried as octet strings
const BINARY_ATTRIBUTES: &[&str] = &[
    attrs::OBJECT_GUID,
    attrs::OBJECT_SID,
    attrs::SID_HISTORY,
    attrs::TOKEN_GROUPS,
    attrs::SECURITY_IDENTIFIER,
    attrs::CREATOR_SID,
    attrs::NT_SECURITY_DESCRIPTOR,
    attrs::MS_DS_ALLOWED_TO_ACT_ON_BEHALF,
    "logonHours",
    "userCertificate",
    "msDS-GenerationId",
    "schemaIDGUID",
    "attributeSecurityGUID",
    "msExchMailboxGuid",
];

/// Large-integer interval timestamps (100-ns ticks since 1601)
const INTERVAL_TIMESTAMPS: &[&str] = &[
    "accountExpires",
    "badPasswordTime",
    "lastLogoff",
    "lastLogon",
    "lastLogonTimestamp",
    "lockoutTime",
    "pwdLastSet",
    "msDS-LastSuccessfulInteractiveLogonTime",
];

/// GeneralizedTime attributes (`YYYYMMDDHHMMSS.0Z`)
const GENERALIZED_TIMES: &[&str] = &[
    "whenCreated",
    "whenChanged",
    "dSCorePropagationData",
    "msTSExpireDate",
];

/// Plain integer attributes
const INTEGER_ATTRIBUTES: &[&str] = &[
    "adminCount",
    "badPwdCount",
    "codePage",
    "countryCode",
    "groupType",
    "instanceType",
    "logonCount",
    "msDS-SupportedEncryptionTypes",
    "primaryGroupID",
    "sAMAccountType",
    "systemFlags",
    "uSNChanged",
    "uSNCreated",
    "userAccountControl",
];

fn listed(list: &[&str], name: &str) -> bool {
    list.iter().any(|n| n.eq_ignore_ascii_case(name))
}

/// Extension trait for SearchEntry to build decoder input
pub trait SearchEntryExt {
    /// Classify every attribute into a [`RawValue`].
    ///
    /// Attributes listed in `requested` come first in that order, the rest
    /// follow sorted by name.
    fn to_attribute_record(&self, requested: &[&str]) -> AttributeRecord;
}

impl SearchEntryExt for SearchEntry {
    fn to_attribute_record(&self, requested: &[&str]) -> AttributeRecord {
        let mut names: Vec<&str> = self
            .attrs
            .keys()
            .chain(self.bin_attrs.keys())
            .map(String::as_str)
            .collect();
        names.sort_by_key(|n| n.to_ascii_lowercase());
        names.dedup();

        let position = |name: &str| {
            requested
                .iter()
                .position(|r| r.eq_ignore_ascii_case(name))
                .unwrap_or(usize::MAX)
        };
        // stable sort keeps alphabetical order among unrequested names
        names.sort_by_key(|n| position(*n));

        let mut record = AttributeRecord::new();
        for name in names {
            let mut values: Vec<RawValue> = Vec::new();
            if let Some(text_values) = self.attrs.get(name) {
                values.extend(text_values.iter().map(|v| classify_text(name, v)));
            }
            if let Some(bin_values) = self.bin_attrs.get(name) {
                values.extend(bin_values.iter().cloned().map(RawValue::Binary));
            }
            record.insert(name, collapse(values));
        }

        debug!("Classified {} attributes for {}", record.len(), self.dn);
        record
    }
}

fn collapse(mut values: Vec<RawValue>) -> RawValue {
    match values.len() {
        0 => RawValue::Null,
        1 => values.remove(0),
        _ => RawValue::Multi(values),
    }
}

/// Classify a value the directory client returned as text
pub fn classify_text(name: &str, value: &str) -> RawValue {
    // valid UTF-8 octet strings are handed back as text
    if listed(BINARY_ATTRIBUTES, name) {
        return RawValue::Binary(value.as_bytes().to_vec());
    }

    if listed(INTERVAL_TIMESTAMPS, name) {
        if let Ok(ticks) = value.trim().parse::<i64>() {
            return RawValue::HighLowPair(HighLowPair::from_i64(ticks));
        }
    }

    if listed(GENERALIZED_TIMES, name) {
        if let Some(dt) = parse_generalized_time(value) {
            return RawValue::DateTime(dt);
        }
    }

    if listed(INTEGER_ATTRIBUTES, name) {
        if let Ok(i) = value.trim().parse::<i64>() {
            return RawValue::Integer(i);
        }
    }

    RawValue::Text(value.to_string())
}

/// Parse `YYYYMMDDHHMMSS[.fraction]Z` as UTC
pub fn parse_generalized_time(value: &str) -> Option<chrono::DateTime<Utc>> {
    let digits = value.get(0..14)?;
    let naive = NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn create_test_entry(
        attrs: Vec<(&str, Vec<&str>)>,
        bin_attrs: Vec<(&str, Vec<Vec<u8>>)>,
    ) -> SearchEntry {
        let mut attr_map = HashMap::new();
        for (key, values) in attrs {
            attr_map.insert(key.to_string(), values.into_iter().map(|s| s.to_string()).collect());
        }
        let mut bin_map = HashMap::new();
        for (key, values) in bin_attrs {
            bin_map.insert(key.to_string(), values);
        }
        SearchEntry {
            dn: "CN=Alice,CN=Users,DC=example,DC=com".to_string(),
            attrs: attr_map,
            bin_attrs: bin_map,
        }
    }

    #[test]
    fn test_requested_order_then_alphabetical() {
        let entry = create_test_entry(
            vec![
                ("sn", vec!["Smith"]),
                ("cn", vec!["Alice"]),
                ("mail", vec!["a@x.com"]),
                ("description", vec!["test"]),
            ],
            vec![("objectSid", vec![vec![1, 0, 0, 0, 0, 0, 0, 5]])],
        );
        let record = entry.to_attribute_record(&["mail", "cn"]);
        let names: Vec<&str> = record.names().collect();
        assert_eq!(names, vec!["mail", "cn", "description", "objectSid", "sn"]);
    }

    #[test]
    fn test_classification() {
        let entry = create_test_entry(
            vec![
                ("pwdLastSet", vec!["132540950450000000"]),
                ("whenCreated", vec!["20210102150405.0Z"]),
                ("userAccountControl", vec!["512"]),
                ("memberOf", vec!["CN=A,DC=x", "CN=B,DC=x"]),
                ("lastLogon", vec!["not-a-number"]),
            ],
            vec![],
        );
        let record = entry.to_attribute_record(&[]);

        assert_eq!(
            record.get("pwdLastSet"),
            Some(&RawValue::HighLowPair(HighLowPair::from_i64(132540950450000000)))
        );
        assert_eq!(
            record.get("whenCreated"),
            Some(&RawValue::DateTime(Utc.with_ymd_and_hms(2021, 1, 2, 15, 4, 5).unwrap()))
        );
        assert_eq!(record.get("userAccountControl"), Some(&RawValue::Integer(512)));
        assert!(matches!(record.get("memberOf"), Some(RawValue::Multi(v)) if v.len() == 2));
        assert_eq!(record.get("lastLogon"), Some(&RawValue::text("not-a-number")));
    }

    #[test]
    fn test_utf8_valid_guid_is_binary() {
        let entry = create_test_entry(vec![("objectGUID", vec!["0123456789abcdef"])], vec![]);
        let record = entry.to_attribute_record(&[]);
        assert_eq!(
            record.get("objectGUID"),
            Some(&RawValue::Binary(b"0123456789abcdef".to_vec()))
        );
    }

    #[test]
    fn test_empty_value_list_is_null() {
        let entry = create_test_entry(vec![("servicePrincipalName", vec![])], vec![]);
        let record = entry.to_attribute_record(&[]);
        assert_eq!(record.get("servicePrincipalName"), Some(&RawValue::Null));
    }

    #[test]
    fn test_parse_generalized_time() {
        assert!(parse_generalized_time("2021").is_none());
        assert!(parse_generalized_time("20211302150405.0Z").is_none());
        assert_eq!(
            parse_generalized_time("20210102150405Z"),
            Some(Utc.with_ymd_and_hms(2021, 1, 2, 15, 4, 5).unwrap())
        );
    }
}
