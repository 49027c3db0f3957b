use crate::mythic_api::types::ApiError;
use url::{ParseError, Url};

/// Resolve an endpoint against a base URL
///
/// An endpoint that is already an absolute URL is returned unchanged, which
/// lets callers follow server-supplied `Location` headers directly. Anything
/// else is treated as a path below the base URL: the base path gains a
/// trailing `/`, the endpoint loses its leading `/`, and the endpoint's query
/// string and fragment are kept.
///
/// # Example
///
/// ```
/// use mythic_sdk::resolve_url;
///
/// let url = resolve_url("https://api.example.com/beta", "/vps/servers?x=1").unwrap();
/// assert_eq!(url.as_str(), "https://api.example.com/beta/vps/servers?x=1");
/// ```
pub fn resolve_url(base_url: &str, endpoint: &str) -> Result<Url, ApiError> {
    match Url::parse(endpoint) {
        Ok(absolute) if absolute.has_host() => {
            tracing::debug!("Using absolute endpoint as-is: {}", absolute);
            return Ok(absolute);
        }
        // A host-less parse such as `v1:status` is still a relative path
        Ok(_) | Err(ParseError::RelativeUrlWithoutBase) => {}
        Err(e) => {
            return Err(ApiError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            });
        }
    }

    let mut base = match Url::parse(base_url) {
        Ok(base) if base.has_host() && !base.cannot_be_a_base() => base,
        _ => return Err(ApiError::InvalidBaseUrl(base_url.to_string())),
    };

    // Split by hand: re-parsing the endpoint would read `v1:` as a scheme
    let (rest, fragment) = match endpoint.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (endpoint, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    let mut joined = base.path().to_string();
    if !joined.ends_with('/') {
        joined.push('/');
    }
    joined.push_str(path.trim_start_matches('/'));

    base.set_path(&joined);
    base.set_query(query.filter(|q| !q.is_empty()));
    base.set_fragment(fragment.filter(|f| !f.is_empty()));
    Ok(base)
}
