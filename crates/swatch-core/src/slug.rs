//! URL-safe identifiers derived from variation names.

/// Lowercase, dash separated slug for `name`.
///
/// Letters and digits survive, common accented letters are transliterated,
/// `&` becomes `and`, and every other run of characters turns into a single
/// `-`. Leading and trailing dashes are trimmed, so a name with no usable
/// characters yields an empty slug.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        let piece: Option<&str> = match ch {
            '&' => Some("and"),
            'ä' | 'Ä' => Some("ae"),
            'ö' | 'Ö' => Some("oe"),
            'ü' | 'Ü' => Some("ue"),
            'ß' => Some("ss"),
            'à' | 'á' | 'â' | 'ã' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Å' => Some("a"),
            'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => Some("e"),
            'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => Some("i"),
            'ò' | 'ó' | 'ô' | 'õ' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ø' => Some("o"),
            'ù' | 'ú' | 'û' | 'Ù' | 'Ú' | 'Û' => Some("u"),
            'ç' | 'Ç' => Some("c"),
            'ñ' | 'Ñ' => Some("n"),
            _ => None,
        };
        if let Some(piece) = piece {
            push_piece(&mut slug, &mut pending_dash, piece);
        } else if ch.is_ascii_alphanumeric() {
            let lower = ch.to_ascii_lowercase();
            push_piece(&mut slug, &mut pending_dash, lower.encode_utf8(&mut [0; 4]));
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn push_piece(slug: &mut String, pending_dash: &mut bool, piece: &str) {
    if *pending_dash && !slug.is_empty() {
        slug.push('-');
    }
    *pending_dash = false;
    slug.push_str(piece);
}

/// Slugs that collide with the component's metadata file.
pub const RESERVED_SLUGS: [&str; 1] = ["meta"];

/// Whether `slug` names something other than a variation.
#[must_use]
pub fn is_reserved_slug(slug: &str) -> bool {
    RESERVED_SLUGS.contains(&slug)
}

/// Whether `slug` could have been produced by [`slugify`].
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .bytes()
            .all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-')
}
