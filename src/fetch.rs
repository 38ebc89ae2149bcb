//! HTTP fetch (component C): GET-bytes and GET-to-file against the package
//! origin, with TLS certificate verification disabled by explicit policy
//! (origins may present self-signed or operator-rotated certificates) and a
//! shared, lazily-built blocking client in the style of the reference
//! tooling's own registry `Fetcher`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use std::time::Duration;

use crate::error::{Error, Result};

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .danger_accept_invalid_certs(true)
        .user_agent(concat!("pacm-get/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("build http client")
});

fn query_string(params: &HashMap<String, String>) -> String {
    if params.is_empty() {
        return String::new();
    }
    let mut pairs: Vec<&String> = params.keys().collect();
    pairs.sort();
    let encoded: Vec<String> = pairs
        .into_iter()
        .map(|k| format!("{}={}", urlencode(k), urlencode(&params[k])))
        .collect();
    format!("?{}", encoded.join("&"))
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Issue a GET request, require a 2xx status, and return the body bytes.
pub fn get_bytes(url: &str, params: &HashMap<String, String>) -> Result<Vec<u8>> {
    let query = query_string(params);
    let full_url = format!("{url}{query}");
    let response = CLIENT
        .get(&full_url)
        .send()
        .map_err(|e| Error::HttpTransport { url: url.to_string(), source: e })?;
    let status = response.status();
    if !(200..300).contains(&status.as_u16()) {
        let body = response.text().unwrap_or_default();
        return Err(Error::Http { url: url.to_string(), query, status: status.as_u16(), body });
    }
    response
        .bytes()
        .map(|b| b.to_vec())
        .map_err(|e| Error::HttpTransport { url: url.to_string(), source: e })
}

/// Issue a GET request and stream the response body to `save_path`, creating
/// any missing parent directories first.
pub fn get_file(url: &str, params: &HashMap<String, String>, save_path: &Path) -> Result<()> {
    let query = query_string(params);
    let full_url = format!("{url}{query}");
    let mut response = CLIENT
        .get(&full_url)
        .send()
        .map_err(|e| Error::HttpTransport { url: url.to_string(), source: e })?;
    let status = response.status();
    if !(200..300).contains(&status.as_u16()) {
        let body = response.text().unwrap_or_default();
        return Err(Error::Http { url: url.to_string(), query, status: status.as_u16(), body });
    }
    if let Some(parent) = save_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut out = fs::File::create(save_path).map_err(|e| Error::io(save_path, e))?;
    response.copy_to(&mut out).map_err(|e| Error::HttpTransport { url: url.to_string(), source: e })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_is_empty_for_no_params() {
        assert_eq!(query_string(&HashMap::new()), "");
    }

    #[test]
    fn query_string_encodes_and_sorts_params() {
        let mut params = HashMap::new();
        params.insert("b".to_string(), "two words".to_string());
        params.insert("a".to_string(), "1".to_string());
        assert_eq!(query_string(&params), "?a=1&b=two%20words");
    }
}
