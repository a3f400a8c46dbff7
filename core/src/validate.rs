/*
 * validate.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Securefetch, a hardened HTTPS client.
 *
 * Securefetch is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Securefetch is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Securefetch.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Pre-flight checks on a resolved request. Rules run in a fixed order and the first
//! violation is returned; nothing here touches the network.

use tracing::debug;

use crate::config::{RequestOptions, TlsVersion};
use crate::error::FetchError;
use crate::net::Capabilities;
use crate::uri::RequestTarget;

/// Validate `options` for `target` against what the TLS capability can negotiate.
pub fn validate(
    target: &RequestTarget,
    options: &RequestOptions,
    capabilities: &Capabilities,
) -> Result<(), FetchError> {
    check_scheme(target, options)?;
    check_config(options)?;
    check_capabilities(options, capabilities)?;
    check_payload(options)?;
    debug!(target = %target, method = %options.method, "request validated");
    Ok(())
}

fn check_scheme(target: &RequestTarget, options: &RequestOptions) -> Result<(), FetchError> {
    let allowed = match target.scheme() {
        "https" => true,
        "http" => !options.tls.enforce_tls,
        _ => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(FetchError::SchemeNotAllowed {
            scheme: target.scheme().to_string(),
        })
    }
}

fn check_config(options: &RequestOptions) -> Result<(), FetchError> {
    for (name, value) in &options.headers {
        if !is_token(name) {
            return Err(FetchError::InvalidConfig(format!("invalid header name {:?}", name)));
        }
        if !is_field_value(value) {
            return Err(FetchError::InvalidConfig(format!("invalid value for header {}", name)));
        }
    }
    let tls = &options.tls;
    if tls.min_version > tls.max_version {
        return Err(FetchError::InvalidConfig(format!(
            "minimum TLS version {} exceeds maximum {}",
            tls.min_version.as_str(),
            tls.max_version.as_str()
        )));
    }
    if tls.cipher_suites.is_empty() {
        return Err(FetchError::InvalidConfig("cipher suite list is empty".into()));
    }
    if tls.key_exchange_groups.is_empty() {
        return Err(FetchError::InvalidConfig("key exchange group list is empty".into()));
    }
    Ok(())
}

fn check_capabilities(options: &RequestOptions, capabilities: &Capabilities) -> Result<(), FetchError> {
    if let Some(cipher) = options
        .tls
        .cipher_suites
        .iter()
        .find(|c| !capabilities.supports_cipher(c))
    {
        return Err(FetchError::UnsupportedCipher(cipher.clone()));
    }
    if let Some(group) = options
        .tls
        .key_exchange_groups
        .iter()
        .find(|g| !capabilities.supports_group(g))
    {
        return Err(FetchError::InvalidConfig(format!("unknown key exchange group {}", group)));
    }
    let tls = &options.tls;
    let versions = tls.min_version..=tls.max_version;
    if !tls.cipher_suites.iter().any(|c| versions.contains(&suite_version(c))) {
        return Err(FetchError::InvalidConfig(format!(
            "no cipher suite usable between {} and {}",
            tls.min_version.as_str(),
            tls.max_version.as_str()
        )));
    }
    Ok(())
}

/// Protocol version a suite belongs to. TLS 1.2 suite names spell out the key exchange
/// (`TLS_ECDHE_RSA_WITH_...`); TLS 1.3 names do not.
fn suite_version(name: &str) -> TlsVersion {
    if name.to_ascii_uppercase().contains("_WITH_") {
        TlsVersion::Tls12
    } else {
        TlsVersion::Tls13
    }
}

fn check_payload(options: &RequestOptions) -> Result<(), FetchError> {
    if options.payload.is_some() && !options.method.allows_payload() {
        return Err(FetchError::PayloadNotAllowedForMethod(options.method));
    }
    Ok(())
}

/// RFC 9110 token.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
                )
        })
}

/// Field value: no control characters other than HTAB.
fn is_field_value(s: &str) -> bool {
    !s.chars().any(|c| c.is_control() && c != '\t')
}
