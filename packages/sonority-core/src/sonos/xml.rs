//! Tolerant XML scanning for UPnP responses.
//!
//! Speakers return loosely-formed XML, often with whole documents embedded
//! HTML-escaped inside other documents. The helpers here work on substrings
//! rather than a strict parser so that a malformed response still yields
//! whatever tags can be matched. Element names are compared by local name:
//! a namespace prefix on the query, the document, or both is ignored.
//!
//! Entity decoding happens once per extraction. A document extracted from
//! another document with [`extract_value`] is decoded exactly one level and
//! can be scanned again.

use std::borrow::Cow;

use quick_xml::events::BytesStart;

// ─────────────────────────────────────────────────────────────────────────────
// Tag Matching
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the local part of a possibly prefixed element name.
fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// Location of one matched element inside a document.
struct ElementSpan {
    /// Byte offset of the opening `<`.
    start: usize,
    /// Byte offset just past the start tag's `>`.
    content_start: usize,
    /// Byte offset of the closing tag's `<` (equal to `content_start` when self-closing).
    content_end: usize,
    /// Byte offset just past the element.
    end: usize,
}

/// Reads the element name that starts at `pos` (just after `<`).
fn name_at(xml: &str, pos: usize) -> &str {
    let rest = &xml[pos..];
    let len = rest
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(rest.len());
    &rest[..len]
}

/// Finds the next start tag named `tag` at or after `from`.
///
/// Returns the offset of `<` and whether the tag is self-closing, plus the
/// offset just past its `>`.
fn find_start_tag(xml: &str, tag: &str, from: usize) -> Option<(usize, usize, bool)> {
    let wanted = local_name(tag);
    let mut cursor = from;

    while let Some(rel) = xml.get(cursor..)?.find('<') {
        let open = cursor + rel;
        let name = name_at(xml, open + 1);

        if !name.is_empty()
            && !name.starts_with(['/', '?', '!'])
            && local_name(name) == wanted
        {
            let close = open + xml[open..].find('>')?;
            let self_closing = xml[..close].ends_with('/');
            return Some((open, close + 1, self_closing));
        }

        cursor = open + 1;
    }

    None
}

/// Finds the closing tag for `tag` at or after `from`.
///
/// Returns the offset of `</` and the offset just past its `>`.
fn find_end_tag(xml: &str, tag: &str, from: usize) -> Option<(usize, usize)> {
    let wanted = local_name(tag);
    let mut cursor = from;

    while let Some(rel) = xml.get(cursor..)?.find("</") {
        let open = cursor + rel;
        let name = name_at(xml, open + 2);

        if local_name(name) == wanted {
            let close = open + xml[open..].find('>')?;
            return Some((open, close + 1));
        }

        cursor = open + 2;
    }

    None
}

/// Locates the next complete element named `tag` at or after `from`.
fn find_element(xml: &str, tag: &str, from: usize) -> Option<ElementSpan> {
    let (start, content_start, self_closing) = find_start_tag(xml, tag, from)?;

    if self_closing {
        return Some(ElementSpan {
            start,
            content_start,
            content_end: content_start,
            end: content_start,
        });
    }

    let (content_end, end) = find_end_tag(xml, tag, content_start)?;
    Some(ElementSpan {
        start,
        content_start,
        content_end,
        end,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Extraction
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the raw, undecoded text between the first `<tag>` and `</tag>`.
///
/// Use this when the content is itself markup that should be scanned further
/// without decoding, such as the `<device>` block of a description document.
#[must_use]
pub fn extract_raw<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    find_element(xml, tag, 0).map(|span| &xml[span.content_start..span.content_end])
}

/// Extracts the entity-decoded text content of the first element named `tag`.
///
/// Returns `None` when the element is absent. An element that is present but
/// empty yields `Some("")`.
///
/// # Example
/// ```ignore
/// let xml = "<item><dc:title>Foo</dc:title></item>";
/// assert_eq!(extract_value(xml, "dc:title"), Some("Foo".to_string()));
/// ```
#[must_use]
pub fn extract_value(xml: &str, tag: &str) -> Option<String> {
    extract_raw(xml, tag).map(|raw| decode_entities(raw).into_owned())
}

/// Extracts the decoded text of every element named `tag`, in document order.
#[must_use]
pub fn extract_all_values(xml: &str, tag: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut cursor = 0;

    while let Some(span) = find_element(xml, tag, cursor) {
        values.push(decode_entities(&xml[span.content_start..span.content_end]).into_owned());
        cursor = span.end.max(span.start + 1);
    }

    values
}

/// Returns every whole `<tag ...>...</tag>` or `<tag .../>` fragment in document order.
///
/// Fragments are returned verbatim; use [`extract_attribute`] and
/// [`extract_value`] on each one.
#[must_use]
pub fn extract_elements<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let mut fragments = Vec::new();
    let mut cursor = 0;

    while let Some(span) = find_element(xml, tag, cursor) {
        fragments.push(&xml[span.start..span.end]);
        cursor = span.end.max(span.start + 1);
    }

    fragments
}

/// Reads an attribute from the start tag at the beginning of `element`.
///
/// The value is entity-decoded. Malformed attributes elsewhere in the tag are
/// skipped rather than failing the lookup.
#[must_use]
pub fn extract_attribute(element: &str, attr: &str) -> Option<String> {
    let open = element.find('<')?;
    let close = open + element[open..].find('>')?;
    let content = element[open + 1..close].trim_end_matches('/').trim_end();

    let name_len = content
        .find(|c: char| c.is_whitespace())
        .unwrap_or(content.len());
    let start = BytesStart::from_content(content, name_len);

    let mut attributes = start.attributes();
    attributes.with_checks(false);
    let value = attributes
        .flatten()
        .find(|a| a.key.as_ref() == attr.as_bytes())
        .map(|a| decode_entities(&String::from_utf8_lossy(&a.value)).into_owned());
    value
}

// ─────────────────────────────────────────────────────────────────────────────
// Entities
// ─────────────────────────────────────────────────────────────────────────────

/// Decodes XML/HTML character entities (`&lt;`, `&amp;`, `&apos;`, numeric references, ...).
///
/// Apply once per level of embedding.
#[must_use]
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(s)
}

/// Escapes XML special characters for embedding in XML content.
///
/// This escapes all five XML special characters:
/// - `&` → `&amp;`
/// - `<` → `&lt;`
/// - `>` → `&gt;`
/// - `"` → `&quot;`
/// - `'` → `&apos;`
///
/// Used for SOAP arguments and DIDL-Lite metadata values. Each nesting level
/// is escaped exactly once by the code that builds it.
#[must_use]
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// ─────────────────────────────────────────────────────────────────────────────
// Durations
// ─────────────────────────────────────────────────────────────────────────────

/// Parses an `H:MM:SS` (or `M:SS`) duration into whole seconds.
///
/// Fractional seconds are truncated. Anything else, including the
/// `NOT_IMPLEMENTED` placeholder speakers report for streams, yields 0.
#[must_use]
pub fn parse_duration(s: &str) -> u64 {
    let s = s.trim();
    let whole = s.split_once('.').map_or(s, |(w, _)| w);

    let parts: Option<Vec<u64>> = whole.split(':').map(|p| p.parse::<u64>().ok()).collect();
    let total = match parts.as_deref() {
        Some(&[h, m, sec]) => h
            .checked_mul(3600)
            .and_then(|h| m.checked_mul(60).and_then(|m| h.checked_add(m)))
            .and_then(|hm| hm.checked_add(sec)),
        Some(&[m, sec]) => m.checked_mul(60).and_then(|m| m.checked_add(sec)),
        _ => None,
    };
    total.unwrap_or(0)
}

/// Formats seconds for display, omitting the hour component when zero.
///
/// `65` becomes `1:05`; `3725` becomes `1:02:05`.
#[must_use]
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Formats seconds as the `H:MM:SS` target expected by `Seek` and the sleep timer.
#[must_use]
pub fn format_hms(secs: u64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn extract_value_finds_prefixed_tag() {
        let xml = "<item><dc:title>Foo</dc:title></item>";
        assert_eq!(extract_value(xml, "dc:title"), Some("Foo".to_string()));
    }

    #[test]
    fn extract_value_missing_tag_is_none_not_empty() {
        let xml = "<item><dc:title>Foo</dc:title></item>";
        assert_eq!(extract_value(xml, "dc:creator"), None);
    }

    #[test]
    fn extract_value_ignores_prefix_mismatch() {
        let xml = r#"<u:GetVolumeResponse xmlns:u="x"><CurrentVolume>42</CurrentVolume></u:GetVolumeResponse>"#;
        assert_eq!(extract_value(xml, "CurrentVolume"), Some("42".to_string()));
        assert_eq!(extract_value(xml, "u:CurrentVolume"), Some("42".to_string()));

        let prefixed = "<s:Body><u:CurrentMute>1</u:CurrentMute></s:Body>";
        assert_eq!(extract_value(prefixed, "CurrentMute"), Some("1".to_string()));
    }

    #[test]
    fn extract_value_tolerates_attributes_on_open_tag() {
        let xml = r#"<res protocolInfo="http-get:*:audio/mpeg:*" duration="0:03:10">http://a/b.mp3</res>"#;
        assert_eq!(extract_value(xml, "res"), Some("http://a/b.mp3".to_string()));
    }

    #[test]
    fn extract_value_does_not_match_longer_names() {
        let xml = "<TrackURI>a</TrackURI><Track>3</Track>";
        assert_eq!(extract_value(xml, "Track"), Some("3".to_string()));
    }

    #[test]
    fn extract_value_decodes_one_level() {
        let xml = "<Result>&lt;DIDL-Lite&gt;&lt;dc:title&gt;Tom &amp;amp; Jerry&lt;/dc:title&gt;</Result>";
        let inner = extract_value(xml, "Result").unwrap();
        assert_eq!(inner, "<DIDL-Lite><dc:title>Tom &amp; Jerry</dc:title>");
        assert_eq!(
            extract_value(&inner, "title"),
            Some("Tom & Jerry".to_string())
        );
    }

    #[test]
    fn extract_value_handles_malformed_input() {
        assert_eq!(extract_value("<a><b>x</a>", "b"), None);
        assert_eq!(extract_value("<<<>>>", "a"), None);
        assert_eq!(extract_value("", "a"), None);
        assert_eq!(extract_value("<a>unterminated", "a"), None);
    }

    #[test]
    fn extract_all_values_in_document_order() {
        let xml = "<r><v>1</v><x/><v>2</v><ns:v>3</ns:v></r>";
        assert_eq!(extract_all_values(xml, "v"), vec!["1", "2", "3"]);
        assert!(extract_all_values(xml, "missing").is_empty());
    }

    #[test]
    fn extract_elements_returns_whole_fragments() {
        let xml = r#"<G><M UUID="a"/><M UUID="b">child</M></G>"#;
        let members = extract_elements(xml, "M");
        assert_eq!(members, vec![r#"<M UUID="a"/>"#, r#"<M UUID="b">child</M>"#]);
    }

    #[test]
    fn extract_attribute_reads_start_tag() {
        let element = r#"<ZoneGroup Coordinator="RINCON_1" ID="RINCON_1:5"><x/></ZoneGroup>"#;
        assert_eq!(
            extract_attribute(element, "Coordinator"),
            Some("RINCON_1".to_string())
        );
        assert_eq!(extract_attribute(element, "ID"), Some("RINCON_1:5".to_string()));
        assert_eq!(extract_attribute(element, "Missing"), None);
    }

    #[test]
    fn extract_attribute_decodes_entities() {
        let element = r#"<ZoneGroupMember ZoneName="Kid&apos;s Room"/>"#;
        assert_eq!(
            extract_attribute(element, "ZoneName"),
            Some("Kid's Room".to_string())
        );
    }

    #[rstest]
    #[case("Tom & Jerry")]
    #[case("<title attr=\"x\">")]
    #[case("it's")]
    #[case("already &amp; escaped")]
    #[case("")]
    fn escape_then_decode_round_trips(#[case] raw: &str) {
        assert_eq!(decode_entities(&escape_xml(raw)), raw);
    }

    #[test]
    fn escape_xml_escapes_each_character_once() {
        assert_eq!(escape_xml("a&b"), "a&amp;b");
        assert_eq!(escape_xml("&amp;"), "&amp;amp;");
        assert_eq!(escape_xml("'\""), "&apos;&quot;");
    }

    #[rstest]
    #[case("0:00:00", 0)]
    #[case("0:03:25", 205)]
    #[case("1:02:05", 3725)]
    #[case("0:03:25.500", 205)]
    #[case("3:25", 205)]
    #[case("NOT_IMPLEMENTED", 0)]
    #[case("", 0)]
    #[case("1:xx:00", 0)]
    #[case("9999999999999999:00:00", 0)]
    #[case("0:18446744073709551615:00", 0)]
    #[case("0:00:18446744073709551615", 18446744073709551615)]
    fn parse_duration_cases(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(parse_duration(input), expected);
    }

    #[test]
    fn format_duration_omits_zero_hours() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(3725), "1:02:05");
    }

    #[test]
    fn duration_round_trip_under_a_day() {
        for secs in (0..86_400).step_by(7) {
            assert_eq!(parse_duration(&format_duration(secs)), secs);
        }
    }

    #[test]
    fn format_hms_always_has_hours() {
        assert_eq!(format_hms(0), "0:00:00");
        assert_eq!(format_hms(90), "0:01:30");
        assert_eq!(format_hms(3600), "1:00:00");
    }
}
