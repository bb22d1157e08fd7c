use super::CodeAcquirer;
use crate::error::Result;
use crate::interrupt::Interrupts;
use async_trait::async_trait;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

const RESPONSE_PAGE: &str = "<html><body><p>Authorization finished. You can close this window.</p></body></html>";

/// How long a connection may stay silent before it is dropped.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type Launcher = fn(&str) -> io::Result<()>;

/// Outcome of one request hitting the loopback redirect listener.
#[derive(Debug, PartialEq, Eq)]
pub enum Redirect {
    Code(String),
    Denied(String),
    Ignored,
}

/// Parses the request line of a redirect, e.g. `GET /?code=4/abc&scope=... HTTP/1.1`.
pub fn parse_redirect(request_line: &str) -> Redirect {
    let mut parts = request_line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return Redirect::Ignored;
    };
    let Ok(url) = Url::parse(&format!("http://localhost{}", target)) else {
        return Redirect::Ignored;
    };

    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if !value.is_empty() => return Redirect::Code(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }
    error.map_or(Redirect::Ignored, Redirect::Denied)
}

/// Opens the system browser and captures the code from the redirect to a loopback listener.
pub struct BrowserRedirect {
    listener: TcpListener,
    port: u16,
    interrupts: Interrupts,
    launch: Launcher,
}

impl BrowserRedirect {
    pub async fn bind(interrupts: Interrupts) -> Result<Self> {
        Self::with_launcher(interrupts, |url| webbrowser::open(url)).await
    }

    pub async fn with_launcher(interrupts: Interrupts, launch: Launcher) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let port = listener.local_addr()?.port();
        Ok(Self {
            listener,
            port,
            interrupts,
            launch,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serves every accepted connection on its own task so an idle preconnect cannot
    /// hold up the request that carries the code.
    async fn wait_for_redirect(&self) -> Result<Option<String>> {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    connections.spawn(serve_redirect(stream, peer));
                }
                Some(served) = connections.join_next() => match served {
                    Ok(Ok(Redirect::Code(code))) => return Ok(Some(code)),
                    Ok(Ok(Redirect::Denied(reason))) => {
                        warn!(%reason, "Authorization denied");
                        return Ok(None);
                    }
                    Ok(Ok(Redirect::Ignored)) => {}
                    Ok(Err(err)) => debug!(%err, "redirect connection failed"),
                    Err(err) => debug!(%err, "redirect handler stopped"),
                },
            }
        }
    }
}

async fn serve_redirect(mut stream: TcpStream, peer: SocketAddr) -> io::Result<Redirect> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);
    let request_line = match timeout(REQUEST_TIMEOUT, read_request(&mut reader)).await {
        Ok(line) => line?,
        Err(_) => {
            debug!(%peer, "idle redirect connection dropped");
            return Ok(Redirect::Ignored);
        }
    };

    let redirect = parse_redirect(&request_line);
    debug!(%peer, ?redirect, "redirect request");
    if redirect == Redirect::Ignored {
        write_half
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await?;
        return Ok(redirect);
    }

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        RESPONSE_PAGE.len(),
        RESPONSE_PAGE
    );
    write_half.write_all(response.as_bytes()).await?;
    write_half.shutdown().await?;
    Ok(redirect)
}

/// Reads the request line and drains the headers, so closing the socket does not reset it.
async fn read_request<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<String> {
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let mut header = String::new();
    while reader.read_line(&mut header).await? > 0 && !header.trim().is_empty() {
        header.clear();
    }
    Ok(request_line)
}

#[async_trait]
impl CodeAcquirer for BrowserRedirect {
    fn redirect_uri(&self) -> Option<String> {
        Some(format!("http://127.0.0.1:{}", self.port))
    }

    async fn acquire(&self, authorize_url: &Url) -> Result<Option<String>> {
        if let Err(err) = (self.launch)(authorize_url.as_str()) {
            warn!(%err, "Could not open a browser");
            eprintln!("Check this link in your browser: {}", authorize_url);
        }

        let scope = self.interrupts.scoped();
        tokio::select! {
            code = self.wait_for_redirect() => code,
            _ = scope.cancelled() => {
                info!("Authorization cancelled");
                Ok(None)
            }
        }
    }
}
