//! Cancellable line prompts.
//!
//! Reading a line from a terminal blocks, and a blocked read cannot be
//! interrupted. Each prompt therefore hands the read to a detached thread and
//! races its result against the cancellation token. If the token wins, the
//! thread is left behind and its line, should one arrive, is discarded.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ErrorKind, ExporterError, Result};
use crate::export::OverwriteConfirm;

type SharedReader = Arc<Mutex<Box<dyn BufRead + Send>>>;
type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Line-oriented prompter over an input and an output stream.
#[derive(Clone)]
pub struct Prompter {
    input: SharedReader,
    output: SharedWriter,
    cancel: CancellationToken,
}

impl Prompter {
    /// Prompt on stdout, read from stdin.
    #[must_use]
    pub fn stdio(cancel: CancellationToken) -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stdout(), cancel)
    }

    /// Prompt on `output`, read from `input`.
    pub fn new(
        input: impl BufRead + Send + 'static,
        output: impl Write + Send + 'static,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            input: Arc::new(Mutex::new(Box::new(input))),
            output: Arc::new(Mutex::new(Box::new(output))),
            cancel,
        }
    }

    /// Print a line of output.
    pub fn say(&self, text: &str) -> Result<()> {
        let mut output = self.output.lock();
        writeln!(output, "{text}")
            .and_then(|()| output.flush())
            .map_err(|e| ExporterError::io("write prompt", e))
    }

    /// Show `question` and return the trimmed answer.
    ///
    /// End of input and cancellation both yield [`ExporterError::Canceled`].
    pub async fn ask(&self, question: &str) -> Result<String> {
        if self.cancel.is_cancelled() {
            return Err(ExporterError::Canceled);
        }

        {
            let mut output = self.output.lock();
            write!(output, "{question}")
                .and_then(|()| output.flush())
                .map_err(|e| ExporterError::io("write prompt", e))?;
        }

        let (tx, rx) = oneshot::channel();
        let input = Arc::clone(&self.input);
        std::thread::spawn(move || {
            let mut line = String::new();
            let result = input.lock().read_line(&mut line).map(|n| (n, line));
            // The receiver is gone if the prompt was canceled.
            let _ = tx.send(result);
        });

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!("Prompt canceled");
                Err(ExporterError::Canceled)
            }
            received = rx => match received {
                Ok(Ok((0, _))) => {
                    debug!("End of input at prompt");
                    Err(ExporterError::Canceled)
                }
                Ok(Ok((_, line))) => Ok(line.trim().to_string()),
                Ok(Err(e)) => Err(ExporterError::io("read from standard input", e)),
                Err(_) => Err(ExporterError::io(
                    "read from standard input",
                    io::Error::new(io::ErrorKind::BrokenPipe, "input reader stopped"),
                )),
            },
        }
    }

    /// Ask until `parse` accepts the answer. Answers rejected with
    /// `InvalidSelection` are reported and asked again; other errors end
    /// the prompt.
    pub async fn ask_parsed<T>(
        &self,
        question: &str,
        parse: impl Fn(&str) -> Result<T>,
    ) -> Result<T> {
        loop {
            let answer = self.ask(question).await?;
            match parse(&answer) {
                Ok(value) => return Ok(value),
                Err(e) if e.kind() == ErrorKind::InvalidSelection => self.say(&format!("{e}. Try again."))?,
                Err(e) => return Err(e),
            }
        }
    }

    /// Ask a yes/no question; only `yes` or `y` (any case) count as yes.
    pub async fn confirm(&self, question: &str) -> Result<bool> {
        let answer = self.ask(question).await?;
        Ok(matches!(answer.to_lowercase().as_str(), "yes" | "y"))
    }
}

impl OverwriteConfirm for Prompter {
    async fn confirm_overwrite(&self, path: &Path) -> Result<bool> {
        self.confirm(&format!(
            "File {} already exists. Overwrite? (yes/no): ",
            path.display()
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    fn prompter(input: &'static str) -> (Prompter, Captured) {
        let captured = Captured::default();
        let prompter = Prompter::new(
            io::Cursor::new(input.as_bytes()),
            captured.clone(),
            CancellationToken::new(),
        );
        (prompter, captured)
    }

    #[tokio::test]
    async fn test_ask_trims_answer() {
        let (prompter, out) = prompter("  data.json \n");
        assert_eq!(prompter.ask("Path: ").await.unwrap(), "data.json");
        assert_eq!(out.text(), "Path: ");
    }

    #[tokio::test]
    async fn test_eof_is_canceled() {
        let (prompter, _) = prompter("");
        assert!(prompter.ask("Path: ").await.unwrap_err().is_canceled());
    }

    #[tokio::test]
    async fn test_cancel_wins_over_blocked_read() {
        // A reader that never returns stands in for an idle terminal.
        struct Blocked;
        impl io::Read for Blocked {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                std::thread::park();
                Ok(0)
            }
        }

        let cancel = CancellationToken::new();
        let prompter = Prompter::new(io::BufReader::new(Blocked), io::sink(), cancel.clone());
        let asking = tokio::spawn(async move { prompter.ask("Path: ").await });
        cancel.cancel();

        let result = asking.await.unwrap();
        assert!(result.unwrap_err().is_canceled());
    }

    #[tokio::test]
    async fn test_confirm() {
        let (prompter, _) = prompter("YES\nn\nmaybe\n");
        assert!(prompter.confirm("? ").await.unwrap());
        assert!(!prompter.confirm("? ").await.unwrap());
        assert!(!prompter.confirm("? ").await.unwrap());
    }

    #[tokio::test]
    async fn test_ask_parsed_retries_invalid_selection() {
        let (prompter, out) = prompter("9\n2\n");
        let layout = prompter
            .ask_parsed("Layout: ", str::parse::<crate::export::CsvLayout>)
            .await
            .unwrap();
        assert_eq!(layout, crate::export::CsvLayout::PerLine);
        assert!(out.text().contains("Invalid CSV layout: 9. Try again."));
    }

    #[tokio::test]
    async fn test_overwrite_confirm_names_file() {
        let (prompter, out) = prompter("yes\n");
        assert!(prompter.confirm_overwrite(Path::new("out.csv")).await.unwrap());
        assert!(out.text().contains("File out.csv already exists"));
    }
}
