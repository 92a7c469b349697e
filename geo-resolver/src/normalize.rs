/// Normalizes a raw area string for index lookups: lowercase, trimmed,
/// whitespace collapsed, punctuation stripped, hyphens treated as spaces.
pub fn normalize_area_text(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut last_was_space = true;
    for c in lowered.chars() {
        let c = match c {
            ',' | '.' => continue,
            '-' | '_' => ' ',
            other => other,
        };
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Synthesizes a slug-safe id from raw text, for areas the reference set does
/// not know about.
pub fn slugify(raw: &str) -> String {
    let normalized = normalize_area_text(raw);
    let slug: String = normalized
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let mut collapsed = String::with_capacity(slug.len());
    let mut last_dash = true;
    for c in slug.chars() {
        if c == '-' {
            if !last_dash {
                collapsed.push('-');
                last_dash = true;
            }
        } else {
            collapsed.push(c);
            last_dash = false;
        }
    }
    while collapsed.ends_with('-') {
        collapsed.pop();
    }
    if collapsed.is_empty() {
        "unknown-area".to_string()
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_whitespace_and_punctuation() {
        assert_eq!(normalize_area_text("  Jumeirah   Lake Towers, "), "jumeirah lake towers");
        assert_eq!(normalize_area_text("Al-Barsha South"), "al barsha south");
        assert_eq!(normalize_area_text("J.L.T"), "jlt");
    }

    #[test]
    fn slug_is_slug_safe() {
        assert_eq!(slugify("Dubai Marina"), "dubai-marina");
        assert_eq!(slugify("  Motor City!!  "), "motor-city");
        assert_eq!(slugify("معاينة"), "unknown-area");
    }
}
