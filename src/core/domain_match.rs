use crate::models::Benefit;

/// Normalize a domain for comparison
///
/// Lowercases, drops a scheme, any leading `www.` labels, the path and the port.
pub fn normalize_domain(domain: &str) -> String {
    let mut d = domain.trim().to_lowercase();

    d = strip_www(&d).to_string();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = d.strip_prefix(scheme) {
            d = rest.to_string();
            break;
        }
    }
    d = strip_www(&d).to_string();

    let host = d.split(['/', '?', '#']).next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    host.trim_end_matches('.').to_string()
}

fn strip_www(mut d: &str) -> &str {
    while let Some(rest) = d.strip_prefix("www.") {
        d = rest;
    }
    d
}

/// Check a benefit's vendor domain against an already-normalized query domain
///
/// Either side containing the other counts, which covers subdomains
/// ("priority.o2.co.uk" vs "o2.co.uk").
#[inline]
pub fn matches_domain(benefit: &Benefit, normalized_query: &str) -> bool {
    if normalized_query.is_empty() {
        return false;
    }

    match benefit.vendor_domain.as_deref().map(normalize_domain) {
        Some(vendor) if !vendor.is_empty() => {
            normalized_query.contains(vendor.as_str()) || vendor.contains(normalized_query)
        }
        _ => false,
    }
}

/// All benefits whose vendor domain matches, in input order
pub fn match_domain<'a, I>(benefits: I, domain: &str) -> Vec<&'a Benefit>
where
    I: IntoIterator<Item = &'a Benefit>,
{
    let query = normalize_domain(domain);
    benefits
        .into_iter()
        .filter(|benefit| matches_domain(benefit, &query))
        .collect()
}
