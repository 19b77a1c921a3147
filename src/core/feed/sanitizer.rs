use std::borrow::Cow;

/// Repairs the two malformations that dominate real-world RSS payloads:
/// bare ampersands and NUL bytes. Ampersands already part of an entity
/// reference (1 to 10 characters of `[A-Za-z0-9#]` closed by `;`) are left
/// alone, so running the repair twice changes nothing. Repair is best effort;
/// parsing may still fail afterwards.
pub fn sanitize_xml(raw: &str) -> Cow<'_, str> {
    let bytes = raw.as_bytes();
    let mut repaired: Option<String> = None;
    let mut copied_to = 0;
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'&' if !entity_follows(&bytes[index + 1..]) => {
                let out = repaired.get_or_insert_with(|| String::with_capacity(raw.len() + 16));
                out.push_str(&raw[copied_to..index]);
                out.push_str("&amp;");
                index += 1;
                copied_to = index;
            }
            0 => {
                let out = repaired.get_or_insert_with(|| String::with_capacity(raw.len()));
                out.push_str(&raw[copied_to..index]);
                index += 1;
                copied_to = index;
            }
            _ => index += 1,
        }
    }

    match repaired {
        Some(mut out) => {
            out.push_str(&raw[copied_to..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(raw),
    }
}

fn entity_follows(rest: &[u8]) -> bool {
    let mut len = 0;
    while len < rest.len() && len < 10 {
        match rest[len] {
            b';' => return len > 0,
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'#' => len += 1,
            _ => return false,
        }
    }
    len < rest.len() && rest[len] == b';'
}
