use super::CodeAcquirer;
use crate::error::Result;
use async_trait::async_trait;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// Shows the authorization link on stderr and reads the code from a line of input.
pub struct ConsolePrompt {
    input: Arc<Mutex<Box<dyn BufRead + Send>>>,
}

impl ConsolePrompt {
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(io::stdin()))
    }

    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            input: Arc::new(Mutex::new(Box::new(reader))),
        }
    }
}

#[async_trait]
impl CodeAcquirer for ConsolePrompt {
    async fn acquire(&self, authorize_url: &Url) -> Result<Option<String>> {
        let mut stderr = io::stderr();
        writeln!(stderr, "Check this link in your browser: {}", authorize_url)?;
        write!(stderr, "Enter verification code: ")?;
        stderr.flush()?;

        // Stdin blocks, so read it off the async workers.
        let input = Arc::clone(&self.input);
        let line = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut line = String::new();
            let mut input = input.lock().unwrap_or_else(PoisonError::into_inner);
            input.read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(io::Error::other)??;

        let code = line.trim();
        if code.is_empty() {
            return Ok(None);
        }
        Ok(Some(code.to_string()))
    }
}
