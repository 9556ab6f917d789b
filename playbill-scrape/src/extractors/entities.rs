//! HTML text entity decoding
//!
//! Covers the named entities theater sites actually emit plus numeric forms.
//! Unknown entities are left as written.

const NAMED_ENTITIES: [(&str, &str); 20] = [
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("nbsp", " "),
    ("ndash", "–"),
    ("mdash", "—"),
    ("lsquo", "\u{2018}"),
    ("rsquo", "\u{2019}"),
    ("ldquo", "\u{201C}"),
    ("rdquo", "\u{201D}"),
    ("hellip", "…"),
    ("eacute", "é"),
    ("egrave", "è"),
    ("aacute", "á"),
    ("oacute", "ó"),
    ("uuml", "ü"),
    ("copy", "©"),
    ("reg", "®"),
];

/// Decode `&name;`, `&#NNN;` and `&#xHH;` entities
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];

        match candidate[1..].find(';').filter(|&end| end > 0 && end <= 10) {
            Some(end) => {
                let entity = &candidate[1..=end];
                match decode_one(entity) {
                    Some(decoded) => out.push_str(&decoded),
                    None => out.push_str(&candidate[..end + 2]),
                }
                rest = &candidate[end + 2..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_one(entity: &str) -> Option<String> {
    if let Some(numeric) = entity.strip_prefix('#') {
        let code = match numeric.strip_prefix(|c| c == 'x' || c == 'X') {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }

    let lower = entity.to_ascii_lowercase();
    NAMED_ENTITIES
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_and_numeric() {
        assert_eq!(decode_entities("Romeo &amp; Juliet"), "Romeo & Juliet");
        assert_eq!(decode_entities("The Winter&#8217;s Tale"), "The Winter\u{2019}s Tale");
        assert_eq!(decode_entities("All&#x27;s Well"), "All's Well");
        assert_eq!(decode_entities("Much&nbsp;Ado"), "Much Ado");
    }

    #[test]
    fn test_unknown_and_bare_ampersands_survive() {
        assert_eq!(decode_entities("R&J"), "R&J");
        assert_eq!(decode_entities("Fish &chips; tonight"), "Fish &chips; tonight");
        assert_eq!(decode_entities("trailing &"), "trailing &");
    }
}
