//! Encrypted transport to the mail store.
//!
//! Opens a TCP stream (directly or through SOCKS5) and performs the TLS
//! handshake, all under a single connect timeout.

use crate::error::{Error, Result};
use crate::proxy::Socks5Proxy;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore, ServerName};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_socks::tcp::Socks5Stream;
use tracing::{debug, instrument};
use webpki_roots::TLS_SERVER_ROOTS;

/// A TLS stream over TCP, used for IMAP communication.
pub(crate) type TlsStream = tokio_rustls::client::TlsStream<TcpStream>;

/// Where and how to reach the IMAP server.
pub(crate) struct Endpoint<'a> {
    pub host: &'a str,
    pub port: u16,
    pub proxy: Option<&'a Socks5Proxy>,
}

impl Endpoint<'_> {
    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Connects to `endpoint` and completes the TLS handshake within `timeout`.
#[instrument(
    name = "connection::open",
    skip_all,
    fields(
        imap_host = %endpoint.host,
        imap_port = endpoint.port,
        proxy_enabled = endpoint.proxy.is_some()
    )
)]
pub(crate) async fn open(endpoint: &Endpoint<'_>, timeout: Duration) -> Result<TlsStream> {
    let target = endpoint.target();
    let server_name = server_name(endpoint.host)?;

    tokio::time::timeout(timeout, handshake(endpoint, &target, server_name))
        .await
        .map_err(|_| Error::ConnectTimeout {
            target: target.clone(),
            timeout,
        })?
}

async fn handshake(
    endpoint: &Endpoint<'_>,
    target: &str,
    server_name: ServerName,
) -> Result<TlsStream> {
    let tcp = match endpoint.proxy {
        Some(proxy) => via_socks5(target, proxy).await?,
        None => direct(target).await?,
    };

    debug!("Performing TLS handshake");

    TlsConnector::from(tls_config())
        .connect(server_name, tcp)
        .await
        .map_err(|source| Error::TlsConnect {
            target: target.to_string(),
            source,
        })
}

/// Shared client config trusting the webpki root set.
fn tls_config() -> Arc<ClientConfig> {
    static CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();
    CONFIG
        .get_or_init(|| {
            let mut roots = RootCertStore::empty();
            roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|ta| {
                OwnedTrustAnchor::from_subject_spki_name_constraints(
                    ta.subject,
                    ta.spki,
                    ta.name_constraints,
                )
            }));

            Arc::new(
                ClientConfig::builder()
                    .with_safe_defaults()
                    .with_root_certificates(roots)
                    .with_no_client_auth(),
            )
        })
        .clone()
}

fn server_name(host: &str) -> Result<ServerName> {
    ServerName::try_from(host).map_err(|source| Error::InvalidDnsName {
        host: host.to_string(),
        source,
    })
}

async fn direct(target: &str) -> Result<TcpStream> {
    debug!(target = %target, "Opening TCP connection");

    TcpStream::connect(target)
        .await
        .map_err(|source| Error::TcpConnect {
            target: target.to_string(),
            source,
        })
}

#[instrument(
    name = "connection::socks5",
    skip_all,
    fields(proxy = %proxy, has_auth = proxy.requires_auth())
)]
async fn via_socks5(target: &str, proxy: &Socks5Proxy) -> Result<TcpStream> {
    let proxy_addr = (proxy.host.as_str(), proxy.port);

    let stream = match &proxy.auth {
        Some(auth) => {
            Socks5Stream::connect_with_password(
                proxy_addr,
                target,
                &auth.username,
                auth.password(),
            )
            .await
        }
        None => Socks5Stream::connect(proxy_addr, target).await,
    };

    stream
        .map(Socks5Stream::into_inner)
        .map_err(|source| Error::Socks5Connect {
            proxy_host: proxy.host.clone(),
            target: target.to_string(),
            source,
        })
}
