//! URL templates with `{domain}`, `{sld}` and `{tld}` placeholders.

use regscout_core::DomainName;
use url::Url;

/// Expand `template` for `domain` and parse the result.
///
/// Placeholder values are valid hostnames and need no escaping.
pub fn expand_url(template: &str, domain: &DomainName) -> Result<Url, url::ParseError> {
    let expanded = template
        .replace("{domain}", domain.as_str())
        .replace("{sld}", domain.sld())
        .replace("{tld}", domain.tld());
    Url::parse(&expanded)
}

/// Check a template once at startup with a sample domain.
pub(crate) fn validate_template(template: &str) -> Result<(), String> {
    if !template.contains("{domain}") && !template.contains("{sld}") {
        return Err(format!(
            "URL template '{template}' has no {{domain}} or {{sld}} placeholder"
        ));
    }
    let sample = DomainName::parse("example.com").map_err(|e| e.to_string())?;
    let url = expand_url(template, &sample).map_err(|e| format!("invalid URL template: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported URL scheme '{other}'")),
    }
}
