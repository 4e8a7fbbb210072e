//! Fixed character replacement rules for tag values and rendered paths.
//!
//! Two layers exist. Tag values are always cleaned so that a tag can never
//! introduce a folder or a control character. The rendered relative path is
//! then cleaned per component; in strict mode it is additionally reduced to
//! `[A-Za-z0-9._-]` using the transliteration table below.

/// Characters no component may contain on common filesystems.
const UNSAFE: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\\'];

/// Latin letters with a well-known ASCII spelling.
const TRANSLITERATIONS: &[(char, &str)] = &[
    ('à', "a"), ('á', "a"), ('â', "a"), ('ã', "a"), ('ä', "a"), ('å', "a"), ('ā', "a"), ('ą', "a"),
    ('À', "A"), ('Á', "A"), ('Â', "A"), ('Ã', "A"), ('Ä', "A"), ('Å', "A"), ('Ā', "A"), ('Ą', "A"),
    ('æ', "ae"), ('Æ', "AE"), ('ç', "c"), ('Ç', "C"), ('ć', "c"), ('Ć', "C"), ('č', "c"), ('Č', "C"),
    ('ď', "d"), ('Ď', "D"), ('ð', "d"), ('Ð', "D"),
    ('è', "e"), ('é', "e"), ('ê', "e"), ('ë', "e"), ('ē', "e"), ('ę', "e"), ('ě', "e"),
    ('È', "E"), ('É', "E"), ('Ê', "E"), ('Ë', "E"), ('Ē', "E"), ('Ę', "E"), ('Ě', "E"),
    ('ğ', "g"), ('Ğ', "G"),
    ('ì', "i"), ('í', "i"), ('î', "i"), ('ï', "i"), ('ı', "i"), ('Ì', "I"), ('Í', "I"), ('Î', "I"), ('Ï', "I"), ('İ', "I"),
    ('ł', "l"), ('Ł', "L"), ('ñ', "n"), ('Ñ', "N"), ('ń', "n"), ('Ń', "N"), ('ň', "n"), ('Ň', "N"),
    ('ò', "o"), ('ó', "o"), ('ô', "o"), ('õ', "o"), ('ö', "o"), ('ø', "o"), ('ő', "o"),
    ('Ò', "O"), ('Ó', "O"), ('Ô', "O"), ('Õ', "O"), ('Ö', "O"), ('Ø', "O"), ('Ő', "O"),
    ('œ', "oe"), ('Œ', "OE"), ('ř', "r"), ('Ř', "R"),
    ('ś', "s"), ('Ś', "S"), ('š', "s"), ('Š', "S"), ('ş', "s"), ('Ş', "S"), ('ß', "ss"),
    ('ť', "t"), ('Ť', "T"), ('þ', "th"), ('Þ', "TH"),
    ('ù', "u"), ('ú', "u"), ('û', "u"), ('ü', "u"), ('ū', "u"), ('ů', "u"), ('ű', "u"),
    ('Ù', "U"), ('Ú', "U"), ('Û', "U"), ('Ü', "U"), ('Ū', "U"), ('Ů', "U"), ('Ű', "U"),
    ('ý', "y"), ('ÿ', "y"), ('Ý', "Y"), ('Ÿ', "Y"),
    ('ź', "z"), ('Ź', "Z"), ('ż', "z"), ('Ż', "Z"), ('ž', "z"), ('Ž', "Z"),
];

/// Clean a raw tag value. Returns `None` when nothing usable is left, so the
/// caller can apply its fallback.
pub fn clean_tag_value(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Clean a rendered relative path component by component. `/` separates
/// components; empty components are dropped and `.`/`..` are neutralised.
pub fn sanitize_relative_path(rendered: &str, strict: bool) -> String {
    let components: Vec<String> = rendered
        .split('/')
        .map(|component| sanitize_component(component, strict))
        .filter(|component| !component.is_empty())
        .collect();
    if components.is_empty() {
        "_".to_string()
    } else {
        components.join("/")
    }
}

fn sanitize_component(component: &str, strict: bool) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        if c.is_control() || UNSAFE.contains(&c) {
            out.push('_');
        } else if !strict {
            out.push(c);
        } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c);
        } else if let Some((_, ascii)) = TRANSLITERATIONS.iter().find(|(from, _)| *from == c) {
            out.push_str(ascii);
        } else if c.is_ascii() {
            out.push('_');
        }
        // Remaining non-ASCII characters have no spelling in the table and
        // are dropped in strict mode.
    }

    let out = if strict { out } else { out.trim().to_string() };
    match out.as_str() {
        "." | ".." => "_".to_string(),
        _ => out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_values_cannot_create_folders() {
        assert_eq!(clean_tag_value("AC/DC").as_deref(), Some("AC-DC"));
        assert_eq!(clean_tag_value("a\\b").as_deref(), Some("a-b"));
        assert_eq!(clean_tag_value("  line\nbreak ").as_deref(), Some("linebreak"));
        assert_eq!(clean_tag_value("   "), None);
        assert_eq!(clean_tag_value("\u{0}"), None);
    }

    #[test]
    fn lenient_mode_keeps_unicode() {
        assert_eq!(
            sanitize_relative_path("Björk/Homogenic/01 - Hunter.mp3", false),
            "Björk/Homogenic/01 - Hunter.mp3"
        );
        assert_eq!(sanitize_relative_path("What?: Now*.mp3", false), "What__ Now_.mp3");
    }

    #[test]
    fn strict_mode_reduces_to_ascii() {
        assert_eq!(sanitize_relative_path("ズblä", true), "bla");
        assert_eq!(sanitize_relative_path("bla /foズo.mp3", true), "bla_/foo.mp3");
        assert_eq!(sanitize_relative_path("Straße & Œuvre", true), "Strasse___OEuvre");
    }

    #[test]
    fn dot_components_neutralised() {
        assert_eq!(sanitize_relative_path("../x.mp3", false), "_/x.mp3");
        assert_eq!(sanitize_relative_path("a/./b", false), "a/_/b");
    }

    #[test]
    fn empty_components_dropped() {
        assert_eq!(sanitize_relative_path("a//b.mp3", false), "a/b.mp3");
        assert_eq!(sanitize_relative_path("/", false), "_");
        assert_eq!(sanitize_relative_path(" / ", false), "_");
    }

    #[test]
    fn deterministic() {
        let input = "Sigur Rós/( )/Untitled #1.ogg";
        assert_eq!(
            sanitize_relative_path(input, true),
            sanitize_relative_path(input, true)
        );
    }
}
