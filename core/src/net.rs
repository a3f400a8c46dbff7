/*
 * net.rs
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

//! Connection capability: open an encrypted, authenticated byte stream under a set of
//! negotiation constraints.
//!
//! `Connector` is the seam between the HTTP layer and TLS. `RustlsConnector` is the
//! production implementation: each `TlsParams` is mapped onto a dedicated rustls
//! `CryptoProvider` (cipher suites and key-exchange groups in the caller's order) and
//! `ClientConfig` (version bounds, ALPN). Roots are native certs first, webpki-roots
//! as fallback.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream as TokioTlsStream;
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::crypto::{aws_lc_rs, CryptoProvider, SupportedKxGroup};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::version::{TLS12, TLS13};
use tokio_rustls::rustls::{RootCertStore, SupportedCipherSuite, SupportedProtocolVersion};
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::config::{TlsPolicy, TlsVersion};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Handshake constraints, mapped 1:1 from a validated `TlsPolicy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsParams {
    pub min_version: TlsVersion,
    pub max_version: TlsVersion,
    /// Colon-joined cipher suite names, preference order.
    pub cipher_suites: String,
    /// Colon-joined key-exchange group names, preference order.
    pub key_exchange_groups: String,
    /// ALPN protocol ids to advertise, preference order.
    pub alpn: Vec<Vec<u8>>,
}

impl TlsParams {
    pub fn from_policy(policy: &TlsPolicy, alpn: &[&[u8]]) -> Self {
        Self {
            min_version: policy.min_version,
            max_version: policy.max_version,
            cipher_suites: policy.cipher_suites.join(":"),
            key_exchange_groups: policy.key_exchange_groups.join(":"),
            alpn: alpn.iter().map(|p| p.to_vec()).collect(),
        }
    }
}

/// Where to connect. `tls == None` means plain TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsParams>,
}

/// An established stream plus the ALPN protocol the server selected (if any).
pub struct Connected<S> {
    pub stream: S,
    pub alpn: Option<Vec<u8>>,
}

/// Names the TLS capability can negotiate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub cipher_suites: Vec<String>,
    pub key_exchange_groups: Vec<String>,
}

impl Capabilities {
    pub fn supports_cipher(&self, name: &str) -> bool {
        self.cipher_suites.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    pub fn supports_group(&self, name: &str) -> bool {
        let name = canonical_group(name);
        self.key_exchange_groups.iter().any(|g| g.eq_ignore_ascii_case(name))
    }
}

/// TLS capability consumed by the dispatchers.
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Cipher suites and groups currently available. Must not touch the network.
    fn capabilities(&self) -> impl Future<Output = Capabilities> + Send;

    /// Open a connection to `endpoint`, performing the TLS handshake when `endpoint.tls` is set.
    fn connect(&self, endpoint: &Endpoint) -> impl Future<Output = io::Result<Connected<Self::Stream>>> + Send;
}

/// Unified stream: plain TCP or TLS. Implements AsyncRead + AsyncWrite.
pub enum HttpStream {
    Plain(TcpStream),
    Tls(Box<TokioTlsStream<TcpStream>>),
}

impl AsyncRead for HttpStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HttpStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_flush(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            for cert in certs {
                let _ = root_store.add(cert);
            }
        }
        Err(e) => debug!(error = %e, "native root certificates unavailable"),
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

static DEFAULT_ROOTS: OnceLock<Arc<RootCertStore>> = OnceLock::new();

fn default_roots() -> Arc<RootCertStore> {
    DEFAULT_ROOTS.get_or_init(|| Arc::new(build_root_store())).clone()
}

/// Public name of a rustls suite. TLS 1.3 suites use the IANA `TLS_` prefix.
fn suite_name(suite: &SupportedCipherSuite) -> String {
    let name = format!("{:?}", suite.suite());
    match name.strip_prefix("TLS13_") {
        Some(rest) => format!("TLS_{}", rest),
        None => name,
    }
}

fn group_name(group: &dyn SupportedKxGroup) -> String {
    format!("{:?}", group.name())
}

/// Map common aliases onto rustls group names.
fn canonical_group(name: &str) -> &str {
    match name {
        "P-256" | "prime256v1" => "secp256r1",
        "P-384" => "secp384r1",
        "P-521" => "secp521r1",
        other => other,
    }
}

/// Every group the provider can offer: the full list plus the defaults, which is where
/// some releases keep the post-quantum hybrid.
fn known_groups() -> Vec<&'static dyn SupportedKxGroup> {
    let mut groups: Vec<&'static dyn SupportedKxGroup> = aws_lc_rs::ALL_KX_GROUPS.to_vec();
    for group in aws_lc_rs::default_provider().kx_groups {
        if !groups.iter().any(|g| g.name() == group.name()) {
            groups.push(group);
        }
    }
    groups
}

fn split_names(list: &str) -> impl Iterator<Item = &str> {
    list.split(':').map(str::trim).filter(|s| !s.is_empty())
}

/// Translate handshake constraints into a rustls client configuration.
pub fn client_config(params: &TlsParams, roots: Arc<RootCertStore>) -> io::Result<ClientConfig> {
    let cipher_suites = split_names(&params.cipher_suites)
        .map(|name| {
            aws_lc_rs::ALL_CIPHER_SUITES
                .iter()
                .find(|s| suite_name(s).eq_ignore_ascii_case(name))
                .copied()
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, format!("unknown cipher suite {}", name))
                })
        })
        .collect::<io::Result<Vec<_>>>()?;

    let known = known_groups();
    let kx_groups = split_names(&params.key_exchange_groups)
        .map(|name| {
            let wanted = canonical_group(name);
            known
                .iter()
                .find(|g| group_name(**g).eq_ignore_ascii_case(wanted))
                .copied()
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, format!("unknown key exchange group {}", name))
                })
        })
        .collect::<io::Result<Vec<_>>>()?;

    let versions: Vec<&'static SupportedProtocolVersion> = [(TlsVersion::Tls12, &TLS12), (TlsVersion::Tls13, &TLS13)]
        .into_iter()
        .filter(|(v, _)| *v >= params.min_version && *v <= params.max_version)
        .map(|(_, p)| p)
        .collect();
    if versions.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty TLS version range"));
    }

    let provider = CryptoProvider {
        cipher_suites,
        kx_groups,
        ..aws_lc_rs::default_provider()
    };
    let mut config = ClientConfig::builder_with_provider(Arc::new(provider))
        .with_protocol_versions(&versions)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = params.alpn.clone();
    Ok(config)
}

/// rustls-backed connector over tokio TCP.
#[derive(Debug, Clone)]
pub struct RustlsConnector {
    connect_timeout: Duration,
    roots: Option<Arc<RootCertStore>>,
}

impl RustlsConnector {
    pub fn new() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            roots: None,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Trust exactly these roots instead of the platform store.
    pub fn with_roots(mut self, roots: RootCertStore) -> Self {
        self.roots = Some(Arc::new(roots));
        self
    }

    fn roots(&self) -> Arc<RootCertStore> {
        match &self.roots {
            Some(r) => r.clone(),
            None => default_roots(),
        }
    }
}

impl Default for RustlsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for RustlsConnector {
    type Stream = HttpStream;

    async fn capabilities(&self) -> Capabilities {
        Capabilities {
            cipher_suites: aws_lc_rs::ALL_CIPHER_SUITES.iter().map(suite_name).collect(),
            key_exchange_groups: known_groups().into_iter().map(group_name).collect(),
        }
    }

    async fn connect(&self, endpoint: &Endpoint) -> io::Result<Connected<HttpStream>> {
        // Handshake settings are checked before any socket is opened.
        let tls_setup = match &endpoint.tls {
            Some(params) => {
                let config = client_config(params, self.roots())?;
                let server_name = ServerName::try_from(endpoint.host.clone())
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid host name"))?;
                Some((config, server_name))
            }
            None => None,
        };

        let tcp = timeout(self.connect_timeout, TcpStream::connect((endpoint.host.as_str(), endpoint.port)))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TCP connect timed out"))??;
        debug!(host = %endpoint.host, port = endpoint.port, "TCP connected");

        let Some((config, server_name)) = tls_setup else {
            return Ok(Connected {
                stream: HttpStream::Plain(tcp),
                alpn: None,
            });
        };

        let tls = TlsConnector::from(Arc::new(config)).connect(server_name, tcp).await?;
        let (_, session) = tls.get_ref();
        let alpn = session.alpn_protocol().map(|p| p.to_vec());
        debug!(
            host = %endpoint.host,
            version = ?session.protocol_version(),
            suite = ?session.negotiated_cipher_suite().map(|s| s.suite()),
            alpn = ?alpn.as_deref().map(String::from_utf8_lossy),
            "TLS handshake complete"
        );
        Ok(Connected {
            stream: HttpStream::Tls(Box::new(tls)),
            alpn,
        })
    }
}
