//! Quinn-based QUIC transport.
//!
//! Every node is both a QUIC server (accepting invites) and a client (sending
//! them), so one endpoint carries both roles. Peers on a LAN have no shared
//! trust root: each node generates a self-signed certificate at startup and
//! accepts any certificate from the other side. TLS still encrypts the
//! session; it does not authenticate it.
//!
//! ALPN is set to "pairplay" so a stray QUIC client cannot complete a
//! handshake.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use pairplay_proto::ALPN_PROTOCOL;
use quinn::{ClientConfig, Endpoint, ServerConfig};

use crate::NetError;

/// Name presented in the self-signed certificate and expected by the client.
pub(crate) const SERVER_NAME: &str = "pairplay.local";

/// QUIC endpoint for session links.
pub struct QuinnTransport {
    endpoint: Endpoint,
}

impl QuinnTransport {
    /// Bind a QUIC endpoint that can both accept and open connections.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `NetError::Config` if the TLS identity cannot be generated
    /// - `NetError::Bind` if the UDP socket cannot be bound
    pub fn bind(addr: SocketAddr, idle_timeout: Duration) -> Result<Self, NetError> {
        let server_config = self_signed_server_config(idle_timeout)?;
        let mut endpoint =
            Endpoint::server(server_config, addr).map_err(|source| NetError::Bind { addr, source })?;
        endpoint.set_default_client_config(insecure_client_config(idle_timeout)?);

        tracing::info!(addr = %endpoint.local_addr()?, "QUIC transport bound");
        Ok(Self { endpoint })
    }

    /// Address the endpoint actually bound to.
    ///
    /// # Errors
    ///
    /// - `NetError::Io` if the socket is gone
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.endpoint.local_addr()?)
    }

    /// Shared handle to the endpoint.
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint.clone()
    }
}

fn transport_config(idle_timeout: Duration) -> Result<Arc<quinn::TransportConfig>, NetError> {
    let mut transport = quinn::TransportConfig::default();
    let idle: quinn::IdleTimeout = idle_timeout
        .try_into()
        .map_err(|e| NetError::Config(format!("idle timeout out of range: {e}")))?;
    transport.max_idle_timeout(Some(idle));
    if !idle_timeout.is_zero() {
        transport.keep_alive_interval(Some(idle_timeout / 3));
    }
    Ok(Arc::new(transport))
}

fn self_signed_server_config(idle_timeout: Duration) -> Result<ServerConfig, NetError> {
    let cert = rcgen::generate_simple_self_signed(vec![SERVER_NAME.to_string()])
        .map_err(|e| NetError::Config(format!("failed to generate self-signed cert: {e}")))?;

    let cert_chain = vec![cert.cert.der().clone()];
    let key = rustls::pki_types::PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    let mut tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key.into())
        .map_err(|e| NetError::Config(format!("invalid TLS config: {e}")))?;
    tls_config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let mut server_config = ServerConfig::with_crypto(Arc::new(
        quinn::crypto::rustls::QuicServerConfig::try_from(tls_config)
            .map_err(|e| NetError::Config(format!("QUIC config error: {e}")))?,
    ));
    server_config.transport_config(transport_config(idle_timeout)?);
    Ok(server_config)
}

fn insecure_client_config(idle_timeout: Duration) -> Result<ClientConfig, NetError> {
    let mut crypto = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InsecureCertVerifier))
        .with_no_client_auth();
    crypto.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let mut config = ClientConfig::new(Arc::new(
        quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
            .map_err(|e| NetError::Config(format!("QUIC config error: {e}")))?,
    ));
    config.transport_config(transport_config(idle_timeout)?);
    Ok(config)
}

/// Accepts whatever certificate the other peer presents.
#[derive(Debug)]
struct InsecureCertVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ED25519,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
        ]
    }
}
