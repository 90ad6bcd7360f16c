//! TLS settings for the transport adapters.
//!
//! The default adapter lets reqwest configure rustls. The no-DH adapter
//! builds its own [`rustls::ClientConfig`] from a crypto provider with
//! every finite-field Diffie-Hellman group and `DHE` suite removed, for
//! servers whose DH parameters make the handshake fail.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::ClientBuilder;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, NamedGroup, RootCertStore, SignatureScheme};
use tracing::debug;

use crate::error::HttpError;

type Result<T> = std::result::Result<T, HttpError>;

/// Which TLS stack an adapter uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsProfile {
    /// reqwest's rustls defaults.
    Default,
    /// rustls without finite-field Diffie-Hellman key exchange.
    NoDiffieHellman,
}

/// Server certificate verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verify {
    /// Accept any server certificate.
    Disabled,
    /// Verify against the built-in / system roots.
    System,
    /// Verify against the PEM bundle at this path.
    Bundle(PathBuf),
}

/// Client certificate for mutual TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCert {
    /// One PEM file holding the certificate chain and the private key.
    Combined(PathBuf),
    /// Certificate chain and private key in separate PEM files.
    Pair { cert: PathBuf, key: PathBuf },
}

impl ClientCert {
    fn key_path(&self) -> &Path {
        match self {
            Self::Combined(path) | Self::Pair { key: path, .. } => path,
        }
    }

    fn cert_path(&self) -> &Path {
        match self {
            Self::Combined(path) | Self::Pair { cert: path, .. } => path,
        }
    }

    /// PEM buffer with key and certificates, as `reqwest::Identity` wants it.
    fn identity_pem(&self) -> Result<Vec<u8>> {
        match self {
            Self::Combined(path) => read(path),
            Self::Pair { cert, key } => {
                let mut pem = read(key)?;
                pem.push(b'\n');
                pem.extend(read(cert)?);
                Ok(pem)
            }
        }
    }

    fn load(&self) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
        let chain = load_certs(self.cert_path())?;
        let key = PrivateKeyDer::from_pem_file(self.key_path())
            .map_err(|e| pem_error(self.key_path(), &e))?;
        Ok((chain, key))
    }
}

/// Apply verification and client certificate settings to a builder using
/// reqwest's own rustls setup.
pub(crate) fn configure_default(
    mut builder: ClientBuilder,
    verify: &Verify,
    cert: Option<&ClientCert>,
) -> Result<ClientBuilder> {
    builder = builder.use_rustls_tls();
    match verify {
        Verify::Disabled => builder = builder.danger_accept_invalid_certs(true),
        Verify::System => {}
        Verify::Bundle(path) => {
            let pem = read(path)?;
            for root in reqwest::Certificate::from_pem_bundle(&pem)? {
                builder = builder.add_root_certificate(root);
            }
            builder = builder.tls_built_in_root_certs(false);
        }
    }
    if let Some(cert) = cert {
        builder = builder.identity(reqwest::Identity::from_pem(&cert.identity_pem()?)?);
    }
    Ok(builder)
}

/// The ring provider minus finite-field DH groups and `DHE` suites.
pub(crate) fn no_dh_provider() -> CryptoProvider {
    let mut provider = rustls::crypto::ring::default_provider();
    provider.kx_groups.retain(|group| !is_ffdhe(group.name()));
    provider
        .cipher_suites
        .retain(|suite| !format!("{:?}", suite.suite()).starts_with("TLS_DHE_"));
    provider
}

fn is_ffdhe(group: NamedGroup) -> bool {
    matches!(
        group,
        NamedGroup::FFDHE2048
            | NamedGroup::FFDHE3072
            | NamedGroup::FFDHE4096
            | NamedGroup::FFDHE6144
            | NamedGroup::FFDHE8192
    )
}

/// Build the rustls configuration used by the no-DH adapter.
pub(crate) fn no_dh_config(verify: &Verify, cert: Option<&ClientCert>) -> Result<ClientConfig> {
    let provider = Arc::new(no_dh_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?;

    let builder = match verify {
        Verify::Disabled => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert {
                algorithms: provider.signature_verification_algorithms,
            })),
        Verify::System => builder.with_root_certificates(native_roots()),
        Verify::Bundle(path) => builder.with_root_certificates(bundle_roots(path)?),
    };

    let mut config = match cert {
        None => builder.with_no_client_auth(),
        Some(cert) => {
            let (chain, key) = cert.load()?;
            builder.with_client_auth_cert(chain, key)?
        }
    };
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(config)
}

fn native_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    let loaded = rustls_native_certs::load_native_certs();
    for error in &loaded.errors {
        debug!(%error, "Skipping unreadable system certificate");
    }
    let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
    debug!(added, ignored, "Loaded system root certificates");
    roots
}

fn bundle_roots(path: &Path) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path)? {
        roots.add(cert)?;
    }
    Ok(roots)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    CertificateDer::pem_file_iter(path)
        .map_err(|e| pem_error(path, &e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| pem_error(path, &e))
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| HttpError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn pem_error(path: &Path, error: &rustls::pki_types::pem::Error) -> HttpError {
    HttpError::Pem {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

/// Verifier for `http-ssl-verify = false` on the no-DH adapter. Handshake
/// signatures are still checked.
#[derive(Debug)]
struct AcceptAnyServerCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
