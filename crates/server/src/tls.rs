//! Server-side TLS: wraps the accepted TCP stream when `server.tls` is
//! configured, requesting (never requiring) a client certificate.
//!
//! axum's own `serve()` only speaks plain TCP, so when TLS is on the
//! controller runs its own accept loop here instead, doing the rustls
//! handshake by hand and then handing the stream to the same router via
//! `hyper-util`'s tower-to-hyper bridge.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use adaptor_domain::config::TlsConfig;
use adaptor_domain::error::{Error, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::service::TowerToHyperService;
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// Whether the peer presented (and validated against the trust store) a
/// client certificate on this connection. Inserted into every request's
/// extensions so handlers/middleware can key enforcement off it; always
/// `false` on a plain (non-TLS) connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientCertPresented(pub bool);

pub fn build_acceptor(tls: &TlsConfig) -> Result<TlsAcceptor> {
    let certs = load_certs(&tls.cert_path)?;
    let key = load_private_key(&tls.key_path)?;

    let client_verifier = match &tls.client_trust_store_path {
        Some(path) => {
            let mut roots = RootCertStore::empty();
            for cert in load_certs(path)? {
                roots
                    .add(cert)
                    .map_err(|e| Error::Fatal(format!("loading TLS client trust store {path}: {e}")))?;
            }
            WebPkiClientVerifier::builder(Arc::new(roots))
                .allow_unauthenticated()
                .build()
                .map_err(|e| Error::Fatal(format!("building client cert verifier: {e}")))?
        }
        None => rustls::server::WebPkiClientVerifier::no_client_auth(),
    };

    let mut server_config = rustls::ServerConfig::builder()
        .with_client_cert_verifier(client_verifier)
        .with_single_cert(certs, key)
        .map_err(|e| Error::Fatal(format!("building TLS server config: {e}")))?;
    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn load_certs(path: &str) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let file = File::open(path).map_err(|e| Error::Fatal(format!("reading {path}: {e}")))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Fatal(format!("parsing certificates in {path}: {e}")))
}

fn load_private_key(path: &str) -> Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let file = File::open(path).map_err(|e| Error::Fatal(format!("reading {path}: {e}")))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::Fatal(format!("parsing private key in {path}: {e}")))?
        .ok_or_else(|| Error::Fatal(format!("no private key found in {path}")))
}

/// Runs the accept loop until `shutdown` resolves. Each connection is
/// handled on its own task tracked in `connections`, so `stop()` can
/// await/timeout them alongside the accept loop itself instead of only
/// bounding how quickly new connections stop being accepted.
pub async fn serve_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: axum::Router,
    mut shutdown: tokio::sync::oneshot::Receiver<()>,
    connections: Arc<tokio::sync::Mutex<tokio::task::JoinSet<()>>>,
) {
    loop {
        let (stream, peer_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!(error = %err, "TLS listener accept failed");
                    continue;
                }
            },
            _ = &mut shutdown => return,
        };

        let acceptor = acceptor.clone();
        let router = router.clone();
        connections.lock().await.spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(err) => {
                    tracing::warn!(%peer_addr, error = %err, "TLS handshake failed");
                    return;
                }
            };

            let cert_presented = tls_stream
                .get_ref()
                .1
                .peer_certificates()
                .map(|certs| !certs.is_empty())
                .unwrap_or(false);

            let svc = router
                .layer(axum::Extension(axum::extract::ConnectInfo(peer_addr)))
                .layer(axum::Extension(ClientCertPresented(cert_presented)));

            let io = TokioIo::new(tls_stream);
            if let Err(err) = ConnBuilder::new(TokioExecutor::new())
                .serve_connection_with_upgrades(io, TowerToHyperService::new(svc))
                .await
            {
                tracing::debug!(%peer_addr, error = %err, "TLS connection closed with error");
            }
        });
    }
}
