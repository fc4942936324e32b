//! Feature extraction delegated to an external process.
//!
//! The command receives the raw image bytes on stdin and must print the
//! feature vector's components to stdout, separated by commas or whitespace.

use crate::error::{Result, RetrievalError};
use crate::features::FeatureExtractor;
use crate::vector::FeatureVector;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::thread;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
}

impl CommandExtractor {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a command line on whitespace (no shell quoting) into program and args.
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| RetrievalError::invalid("extractor command is empty"))?;
        Ok(Self::new(program, parts))
    }

    fn failure(&self, reason: impl Into<String>) -> RetrievalError {
        RetrievalError::Extraction {
            item: self.program.clone(),
            reason: reason.into(),
        }
    }
}

impl FeatureExtractor for CommandExtractor {
    fn extract(&self, image: &[u8]) -> Result<FeatureVector> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.failure(format!("failed to spawn: {}", e)))?;

        // Feed stdin from a separate thread so a child that writes before it
        // has read everything cannot deadlock on a full pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            let bytes = image.to_vec();
            thread::spawn(move || stdin.write_all(&bytes))
        });

        let output = child
            .wait_with_output()
            .map_err(|e| self.failure(e.to_string()))?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Err(e)) if e.kind() != ErrorKind::BrokenPipe => {
                    return Err(self.failure(format!("writing image to stdin: {}", e)))
                }
                Err(_) => return Err(self.failure("stdin writer panicked")),
                _ => {}
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(format!("{}: {}", output.status, stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let vector: FeatureVector = stdout
            .parse()
            .map_err(|e: RetrievalError| self.failure(format!("unparsable output: {}", e)))?;
        debug!(program = %self.program, dimension = vector.dimension(), "extracted features");
        Ok(vector)
    }
}
