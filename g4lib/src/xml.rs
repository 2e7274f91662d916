//! Manufacturing/firmware/software pages wrap a single XML element whose
//! attributes are the payload. Malformed XML is a soft failure: the
//! original bytes are preserved under an `"InvalidXML"` key rather than
//! aborting the scan, so diagnostics survive firmware variations.

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde::Serialize;

/// A flat `{attribute name -> value}` mapping decoded from a single-element
/// XML payload, or a soft failure carrying the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum XmlInfo {
    Attributes(BTreeMap<String, String>),
    Invalid { #[serde(rename = "InvalidXML")] invalid_xml: String },
}

impl XmlInfo {
    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            Self::Attributes(m) => m.get(key).map(String::as_str),
            Self::Invalid { .. } => None,
        }
    }
}

/// Parses the attribute set of the payload's single top-level element.
/// Any parse failure (unterminated tag, invalid UTF-8, no element at all)
/// downgrades to [`XmlInfo::Invalid`] rather than propagating an error.
pub fn parse(raw: &[u8]) -> XmlInfo {
    parse_attributes(raw).unwrap_or_else(|| XmlInfo::Invalid {
        invalid_xml: String::from_utf8_lossy(raw).into_owned(),
    })
}

fn parse_attributes(raw: &[u8]) -> Option<XmlInfo> {
    let mut reader = Reader::from_reader(raw);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).ok()? {
            Event::Start(e) | Event::Empty(e) => {
                let mut m = BTreeMap::new();
                for attr in e.attributes() {
                    let attr = attr.ok()?;
                    let key = String::from_utf8(attr.key.as_ref().to_vec()).ok()?;
                    let value = attr.unescape_value().ok()?.into_owned();
                    m.insert(key, value);
                }
                return Some(XmlInfo::Attributes(m));
            }
            Event::Eof => return None,
            _ => {}
        }
        buf.clear();
    }
}

/// Slices the record/page payload from `offset` up to (but not including)
/// the first null byte, the convention every XML-bearing page uses to
/// terminate its single record inside a longer, `0xFF`-padded buffer.
pub fn slice_until_nul(v: &[u8]) -> &[u8] {
    match v.iter().position(|&b| b == 0) {
        Some(i) => &v[..i],
        None => v,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_flat_attributes() {
        let xml =
            br#"<FirmwareHeader SerialNumber="SM44792675" HardwarePartNumber="MT20649" HardwareRevision="23" />"#;
        let info = parse(xml);
        assert_eq!(info.get("SerialNumber"), Some("SM44792675"));
        assert_eq!(info.get("HardwarePartNumber"), Some("MT20649"));
        assert_eq!(info.get("HardwareRevision"), Some("23"));
    }

    #[test]
    fn malformed_xml_soft_fails() {
        let raw = b"not xml at all <<<";
        let info = parse(raw);
        match info {
            XmlInfo::Invalid { invalid_xml } => assert_eq!(invalid_xml, "not xml at all <<<"),
            XmlInfo::Attributes(_) => panic!("expected soft failure"),
        }
    }

    #[test]
    fn slices_at_first_nul() {
        let v = [b'a', b'b', 0, 0xFF, 0xFF];
        assert_eq!(slice_until_nul(&v), b"ab");
    }
}
