//! In-process fakes for the note service and the container manager.

#![allow(dead_code)]

use std::time::Duration;

use async_trait::async_trait;
use mt_domain::error::{Error, Result};
use mt_domain::note::{Note, Visibility};
use mt_notes::NoteApi;
use mt_sandbox::{ContainerManager, ContainerStatus, ShellOutput};
use parking_lot::Mutex;

#[derive(Default)]
pub struct FakeContainers {
    pub executed: Mutex<Vec<String>>,
}

#[async_trait]
impl ContainerManager for FakeContainers {
    async fn ensure_container(&self) -> Result<String> {
        Ok("fake".into())
    }

    async fn execute_shell(&self, _container: &str, command: &str, _timeout: Duration) -> Result<ShellOutput> {
        self.executed.lock().push(command.to_owned());
        let (exit_code, stdout) = match command.strip_prefix("echo ") {
            Some(rest) => (0, format!("{rest}\n")),
            None if command == "false" => (1, String::new()),
            None => (127, String::new()),
        };
        Ok(ShellOutput {
            exit_code,
            stdout,
            stderr: String::new(),
            duration_secs: 0.02,
        })
    }

    async fn status(&self) -> ContainerStatus {
        ContainerStatus::default()
    }
}

/// Records every comment; fails the chunk numbers listed in `fail_chunks`.
#[derive(Default)]
pub struct RecordingNoteApi {
    pub unconfigured: bool,
    pub fail_chunks: Vec<usize>,
    pub posted: Mutex<Vec<(String, String, Visibility)>>,
}

#[async_trait]
impl NoteApi for RecordingNoteApi {
    fn is_configured(&self) -> bool {
        !self.unconfigured
    }

    async fn create_comment(&self, parent: &str, content: &str, visibility: Visibility) -> Result<Note> {
        let mut posted = self.posted.lock();
        let n = posted.len() + 1;
        posted.push((parent.to_owned(), content.to_owned(), visibility));
        if self.fail_chunks.contains(&n) {
            return Err(Error::Auth("token rejected".into()));
        }
        Ok(Note {
            name: Some(format!("memos/c{n}")),
            content: content.to_owned(),
            ..Note::default()
        })
    }

    async fn get_note(&self, _name: &str) -> Result<Option<Note>> {
        Ok(None)
    }

    async fn list_notes(&self, _filter: Option<&str>, _page_size: Option<u32>) -> Result<Vec<Note>> {
        Ok(Vec::new())
    }

    async fn health(&self) -> Result<bool> {
        Ok(true)
    }
}
