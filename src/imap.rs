//! IMAP implementation of [`MailboxProtocol`]
//!
//! Messages are addressed by UID and fetched with `BODY.PEEK[]`, so
//! reading a message never sets `\Seen` on its own. Every server round
//! trip is bounded by the configured timeout.

use crate::config::{ImapConfig, TlsMode};
use crate::error::{Error, Result, from_imap};
use crate::session::{MailboxProtocol, MessageId, RawMessage};
use async_imap::{Client, Session};
use async_trait::async_trait;
use futures::TryStreamExt;
use rustls::pki_types::ServerName;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info};

type ImapStream = Compat<TlsStream<TcpStream>>;

enum Conn {
    Idle,
    Connected(Client<ImapStream>),
    Authenticated(Session<ImapStream>),
}

/// A single IMAP connection over TLS.
pub struct ImapProtocol {
    tls: TlsMode,
    accept_invalid_certs: bool,
    timeout: Duration,
    conn: Conn,
}

impl ImapProtocol {
    #[must_use]
    pub const fn new(tls: TlsMode, accept_invalid_certs: bool) -> Self {
        Self {
            tls,
            accept_invalid_certs,
            timeout: Duration::from_secs(20),
            conn: Conn::Idle,
        }
    }

    #[must_use]
    pub const fn from_config(config: &ImapConfig) -> Self {
        Self::new(config.tls, config.accept_invalid_certs)
    }

    fn session(&mut self) -> Result<&mut Session<ImapStream>> {
        match &mut self.conn {
            Conn::Authenticated(session) => Ok(session),
            _ => Err(Error::Protocol("not logged in".into())),
        }
    }
}

#[async_trait]
impl MailboxProtocol for ImapProtocol {
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        self.timeout = timeout;
        let client = timed(
            timeout,
            "Connect",
            open(host, port, self.tls, self.accept_invalid_certs),
        )
        .await?;
        self.conn = Conn::Connected(client);
        info!("Connected to IMAP server");
        Ok(())
    }

    async fn authenticate(&mut self, identity: &str, secret: &str) -> Result<()> {
        let Conn::Connected(client) = std::mem::replace(&mut self.conn, Conn::Idle) else {
            return Err(Error::Protocol("login requires a fresh connection".into()));
        };

        let login = tokio::time::timeout(self.timeout, client.login(identity, secret))
            .await
            .map_err(|_| elapsed("Login", self.timeout))?;

        match login {
            Ok(session) => {
                self.conn = Conn::Authenticated(session);
                Ok(())
            }
            Err((e, client)) => {
                self.conn = Conn::Connected(client);
                Err(match e {
                    async_imap::error::Error::Io(_) | async_imap::error::Error::ConnectionLost => {
                        from_imap(e, "Login failed")
                    }
                    other => Error::Auth(other.to_string()),
                })
            }
        }
    }

    async fn select_folder(&mut self, name: &str) -> Result<()> {
        let limit = self.timeout;
        let session = self.session()?;
        let mailbox = timed(limit, "Select", async {
            session
                .select(name)
                .await
                .map_err(|e| from_imap(e, &format!("Failed to select {name}")))
        })
        .await?;
        debug!("Selected {} ({} messages)", name, mailbox.exists);
        Ok(())
    }

    async fn search_unseen(&mut self) -> Result<Vec<MessageId>> {
        let limit = self.timeout;
        let session = self.session()?;
        let uids = timed(limit, "Search", async {
            session
                .uid_search("UNSEEN")
                .await
                .map_err(|e| from_imap(e, "Search failed"))
        })
        .await?;
        Ok(uids.into_iter().map(MessageId).collect())
    }

    async fn fetch(&mut self, id: MessageId) -> Result<Option<RawMessage>> {
        let limit = self.timeout;
        let session = self.session()?;
        let messages = timed(limit, "Fetch", async {
            session
                .uid_fetch(id.to_string(), "(BODY.PEEK[])")
                .await
                .map_err(|e| from_imap(e, "Fetch failed"))?
                .try_collect::<Vec<_>>()
                .await
                .map_err(|e| from_imap(e, "Fetch failed"))
        })
        .await?;

        Ok(messages
            .iter()
            .filter(|msg| msg.uid.is_none_or(|uid| uid == id.0))
            .find_map(|msg| msg.body().map(<[u8]>::to_vec)))
    }

    async fn set_seen_flag(&mut self, id: MessageId) -> Result<()> {
        let limit = self.timeout;
        let session = self.session()?;
        timed(limit, "Store", async {
            session
                .uid_store(id.to_string(), "+FLAGS (\\Seen)")
                .await
                .map_err(|e| from_imap(e, "Store failed"))?
                .try_collect::<Vec<_>>()
                .await
                .map_err(|e| from_imap(e, "Store failed"))
        })
        .await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let limit = self.timeout;
        match std::mem::replace(&mut self.conn, Conn::Idle) {
            Conn::Authenticated(mut session) => {
                timed(limit, "Logout", async {
                    session.logout().await.map_err(|e| from_imap(e, "Logout failed"))
                })
                .await
            }
            Conn::Connected(mut client) => {
                timed(limit, "Logout", async {
                    client
                        .run_command_and_check_ok("LOGOUT", None)
                        .await
                        .map_err(|e| from_imap(e, "Logout failed"))
                })
                .await
            }
            Conn::Idle => Ok(()),
        }
    }
}

async fn open(
    host: &str,
    port: u16,
    tls: TlsMode,
    accept_invalid_certs: bool,
) -> Result<Client<ImapStream>> {
    debug!("Connecting to IMAP server at {}:{}", host, port);
    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(|e| Error::Connection(format!("{host}:{port}: {e}")))?;

    let connector = tls_connector(accept_invalid_certs)?;
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;

    let tcp = match tls {
        TlsMode::Implicit => tcp,
        TlsMode::StartTls => starttls(tcp).await?,
    };

    let tls_stream = connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::Tls(e.to_string()))?;

    Ok(Client::new(tls_stream.compat()))
}

/// Upgrade a plain connection with `STARTTLS`, returning the raw socket
/// ready for the TLS handshake.
async fn starttls(tcp: TcpStream) -> Result<TcpStream> {
    let mut client = Client::new(tcp.compat());
    client
        .run_command_and_check_ok("STARTTLS", None)
        .await
        .map_err(|e| Error::Tls(format!("STARTTLS failed: {e}")))?;
    Ok(client.into_inner().into_inner())
}

fn tls_connector(accept_invalid_certs: bool) -> Result<TlsConnector> {
    let builder =
        rustls::ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Tls(e.to_string()))?;

    let config = if accept_invalid_certs {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(DangerousVerifier))
            .with_no_client_auth()
    } else {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    };
    Ok(TlsConnector::from(Arc::new(config)))
}

async fn timed<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| elapsed(what, limit))?
}

fn elapsed(what: &str, limit: Duration) -> Error {
    Error::Connection(format!("{what} timed out after {}s", limit.as_secs()))
}

/// Accepts any server certificate. Only used when
/// `MAIL_ACCEPT_INVALID_CERTS` is set, e.g. for a local bridge with a
/// self-signed certificate.
#[derive(Debug)]
struct DangerousVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
