//! Server module for running Terraform providers
//!
//! Terraform launches the provider binary and speaks go-plugin's handshake:
//! the magic cookie arrives in the environment, the plugin binds a local
//! port and announces it on stdout. When Terraform passes its client
//! certificate the plugin answers with a self-signed server certificate
//! of its own, carried base64-encoded in the handshake line.

use crate::error::{Result, TfplugError};
use crate::grpc::GrpcProviderServer;
use crate::provider::Provider;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use std::io::Write;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Identity, Server, ServerTlsConfig};

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";
pub const CLIENT_CERT_KEY: &str = "PLUGIN_CLIENT_CERT";

const CORE_PROTOCOL_VERSION: u32 = 1;
const PLUGIN_PROTOCOL_VERSION: u32 = 6;

/// Server configuration for running a Terraform provider
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum message size in bytes
    pub max_message_size: usize,
    /// Whether to refuse starting without Terraform's magic cookie
    pub require_magic_cookie: bool,
    /// Serve TLS with a generated certificate
    pub auto_tls: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_message_size: 256 << 20,
            require_magic_cookie: true,
            auto_tls: true,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// TLS follows Terraform's lead: only when it sent a client certificate.
    pub fn from_env() -> Self {
        Self {
            auto_tls: std::env::var_os(CLIENT_CERT_KEY).is_some(),
            ..Self::default()
        }
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn without_magic_cookie(mut self) -> Self {
        self.require_magic_cookie = false;
        self
    }

    pub fn without_tls(mut self) -> Self {
        self.auto_tls = false;
        self
    }
}

struct ServerCertificate {
    cert_pem: String,
    key_pem: String,
    der: Vec<u8>,
}

fn generate_certificate() -> Result<ServerCertificate> {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .map_err(|e| TfplugError::TlsError(format!("Failed to generate certificate: {}", e)))?;
    Ok(ServerCertificate {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
        der: cert.der().to_vec(),
    })
}

pub fn check_magic_cookie() -> Result<()> {
    match std::env::var(MAGIC_COOKIE_KEY) {
        Ok(value) if value == MAGIC_COOKIE_VALUE => Ok(()),
        _ => Err(TfplugError::HandshakeError(
            "This binary is a plugin. These are not meant to be executed directly. \
             Please execute the program that consumes these plugins, which will \
             load any plugins automatically"
                .to_string(),
        )),
    }
}

/// The line go-plugin reads from stdout to find the server.
pub fn handshake_line(addr: SocketAddr, server_cert_der: Option<&[u8]>) -> String {
    let mut line = format!(
        "{}|{}|tcp|{}|grpc",
        CORE_PROTOCOL_VERSION, PLUGIN_PROTOCOL_VERSION, addr
    );
    if let Some(der) = server_cert_der {
        line.push('|');
        line.push_str(&STANDARD_NO_PAD.encode(der));
    }
    line
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for interrupt: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Interrupt received, shutting down");
}

/// Main entry point for running a provider
pub async fn serve<P: Provider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    if config.require_magic_cookie {
        check_magic_cookie()?;
    }

    let provider_service = GrpcProviderServer::new(provider)
        .into_service()
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    let mut builder = Server::builder();
    let certificate = if config.auto_tls {
        // Fails only when a process-wide provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let certificate = generate_certificate()?;
        let identity = Identity::from_pem(&certificate.cert_pem, &certificate.key_pem);
        builder = builder.tls_config(ServerTlsConfig::new().identity(identity))?;
        Some(certificate)
    } else {
        None
    };

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let actual_addr = listener.local_addr()?;

    {
        let mut stdout = std::io::stdout().lock();
        writeln!(
            stdout,
            "{}",
            handshake_line(actual_addr, certificate.as_ref().map(|c| c.der.as_slice()))
        )?;
        stdout.flush()?;
    }

    tracing::info!(
        address = %actual_addr,
        tls = certificate.is_some(),
        "Provider server started"
    );

    let incoming = TcpListenerStream::new(listener);
    builder
        .add_service(provider_service)
        .serve_with_incoming_shutdown(incoming, shutdown_signal())
        .await?;

    Ok(())
}

/// Convenience function to run a provider with the environment's settings
pub async fn serve_default<P: Provider + 'static>(provider: P) -> Result<()> {
    serve(provider, ServerConfig::from_env()).await
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn handshake_line_without_tls() {
        let addr: SocketAddr = "127.0.0.1:41234".parse().unwrap();
        assert_eq!(handshake_line(addr, None), "1|6|tcp|127.0.0.1:41234|grpc");
    }

    #[test]
    fn handshake_line_carries_unpadded_certificate() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let line = handshake_line(addr, Some(&[0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(line, "1|6|tcp|127.0.0.1:5000|grpc|3q2+7w");
    }

    #[test]
    fn generated_certificate_is_pem_and_der() {
        let certificate = generate_certificate().unwrap();
        assert!(certificate.cert_pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(certificate.key_pem.contains("PRIVATE KEY"));
        assert_eq!(certificate.der[0], 0x30);
    }

    #[test]
    #[serial]
    fn magic_cookie_gates_startup() {
        std::env::remove_var(MAGIC_COOKIE_KEY);
        let err = check_magic_cookie().unwrap_err();
        assert!(matches!(err, TfplugError::HandshakeError(_)));

        std::env::set_var(MAGIC_COOKIE_KEY, "wrong");
        assert!(check_magic_cookie().is_err());

        std::env::set_var(MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE);
        assert!(check_magic_cookie().is_ok());
        std::env::remove_var(MAGIC_COOKIE_KEY);
    }

    #[test]
    #[serial]
    fn tls_follows_client_certificate() {
        std::env::remove_var(CLIENT_CERT_KEY);
        assert!(!ServerConfig::from_env().auto_tls);

        std::env::set_var(CLIENT_CERT_KEY, "-----BEGIN CERTIFICATE-----");
        assert!(ServerConfig::from_env().auto_tls);
        std::env::remove_var(CLIENT_CERT_KEY);
    }
}
