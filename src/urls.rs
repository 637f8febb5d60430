use url::Url;

const FRENCH_HOST: &str = "fr.airbnb.com";
const DEFAULT_HOST: &str = "www.airbnb.com";

/// Resolve `href` against `base` and drop query and fragment.
pub fn canonicalize(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let mut resolved = match Url::parse(base) {
        Ok(base) => base.join(href).ok()?,
        Err(_) => Url::parse(href).ok()?,
    };
    resolved.set_query(None);
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

/// Start URL variants to try, French host first.
///
/// The French host avoids a locale redirect with the browser profile used
/// here; the URL as given is kept as the second choice.
pub fn navigation_variants(start_url: &str) -> Vec<String> {
    let variants = if start_url.contains(FRENCH_HOST) {
        vec![
            start_url.to_string(),
            start_url.replace(FRENCH_HOST, DEFAULT_HOST),
        ]
    } else {
        vec![
            start_url.replace(DEFAULT_HOST, FRENCH_HOST),
            start_url.to_string(),
        ]
    };
    let mut unique: Vec<String> = Vec::with_capacity(variants.len());
    for v in variants {
        if !unique.contains(&v) {
            unique.push(v);
        }
    }
    unique
}
