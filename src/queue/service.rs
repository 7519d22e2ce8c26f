// Command Queue - the local write path for users, devices and commands
//
// Writes go through the same StorageAdapter and per-key locks as gossip
// merges. Every mutation advances updated_at so replicas pick it up.
//
// Deletions are local only: a popped command still held by a peer that has
// not seen the pop comes back on the next exchange.

use crate::model::{clock, Command, Device, Entity, Timestamp, User};
use crate::storage::{StorageAdapter, StoreError};
use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Unknown device {0}")]
    UnknownDevice(String),

    #[error("Invalid device id or secret")]
    InvalidCredentials,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Device command queue over a store
pub struct CommandQueue<S> {
    store: Arc<S>,
}

impl<S> Clone for CommandQueue<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

fn required(value: &str, field: &'static str) -> Result<(), QueueError> {
    if value.trim().is_empty() {
        return Err(QueueError::MissingField(field));
    }
    Ok(())
}

impl<S: StorageAdapter> CommandQueue<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create an operator account. Usernames are unique.
    pub fn register_user(&self, username: &str, password_hash: &str) -> Result<User, QueueError> {
        required(username, "username")?;
        required(password_hash, "password_hash")?;
        let user = self.store.create(User::new(username, password_hash))?;
        info!(user_id = user.id, username = %user.username, "Registered user");
        Ok(user)
    }

    /// Register a device under its own id
    pub fn register_device(&self, esp_id: &str, secret: &str) -> Result<Device, QueueError> {
        required(esp_id, "esp_id")?;
        required(secret, "esp_secret_key")?;
        let device = self.store.create(Device::new(esp_id, secret))?;
        info!(esp_id = %device.esp_id, "Registered device");
        Ok(device)
    }

    /// Queue a command for a registered device.
    ///
    /// The id is allocated inside `create`, so no key lock is held. A merge
    /// inserting the same id concurrently sees the record on its second
    /// lookup and resolves it by timestamp.
    pub fn enqueue(&self, esp_id: &str, command: &str) -> Result<Command, QueueError> {
        required(esp_id, "esp_id")?;
        required(command, "command")?;
        if self.store.find::<Device>(&esp_id.to_string())?.is_none() {
            return Err(QueueError::UnknownDevice(esp_id.to_string()));
        }
        let command = self.store.create(Command::new(esp_id, command))?;
        debug!(esp_id = %command.esp_id, command_id = command.id, "Queued command");
        Ok(command)
    }

    /// Replace every queued command of `esp_id` with `commands`, in order.
    ///
    /// Each delete and insert is applied on its own; a poll running at the
    /// same time may still receive one of the old commands. A peer that has
    /// not seen the replacement may bring old commands back.
    pub fn load_commands<T: AsRef<str>>(
        &self,
        esp_id: &str,
        commands: &[T],
    ) -> Result<Vec<Command>, QueueError> {
        required(esp_id, "esp_id")?;
        if commands.is_empty() {
            return Err(QueueError::MissingField("commands"));
        }
        for command in commands {
            required(command.as_ref(), "command")?;
        }
        {
            let _guard = self.store.lock_key::<Device>(&esp_id.to_string());
            if self.store.find::<Device>(&esp_id.to_string())?.is_none() {
                return Err(QueueError::UnknownDevice(esp_id.to_string()));
            }
        }

        let replaced = self.pending(esp_id)?;
        for old in &replaced {
            let _guard = self.store.lock_key::<Command>(&old.id);
            self.store.delete::<Command>(&old.id)?;
        }

        let loaded = commands
            .iter()
            .map(|text| self.store.create(Command::new(esp_id, text.as_ref())))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            esp_id = %esp_id,
            replaced = replaced.len(),
            loaded = loaded.len(),
            "Loaded command queue"
        );
        Ok(loaded)
    }

    /// Commands waiting for `esp_id`, oldest first
    pub fn pending(&self, esp_id: &str) -> Result<Vec<Command>, QueueError> {
        let mut commands: Vec<Command> = self
            .store
            .list_all::<Command>()?
            .into_iter()
            .filter(|command| command.esp_id == esp_id)
            .collect();
        commands.sort_by_key(|command| command.id);
        Ok(commands)
    }

    /// Device check-in: authenticate, record the poll time, and pop the
    /// oldest queued command. `None` means the queue is empty.
    pub fn poll(&self, esp_id: &str, secret: &str) -> Result<Option<Command>, QueueError> {
        self.poll_at(esp_id, secret, clock::now())
    }

    /// `poll` with an explicit check-in time
    pub fn poll_at(
        &self,
        esp_id: &str,
        secret: &str,
        at: Timestamp,
    ) -> Result<Option<Command>, QueueError> {
        let key = esp_id.to_string();
        {
            let _guard = self.store.lock_key::<Device>(&key);
            let mut device = self
                .store
                .find::<Device>(&key)?
                .filter(|device| device.verify_secret(secret))
                .ok_or(QueueError::InvalidCredentials)?;
            device.record_poll(at);
            self.store.update(&device)?;
        }

        for candidate in self.pending(esp_id)? {
            let _guard = self.store.lock_key::<Command>(&candidate.natural_key());
            if let Some(command) = self.store.delete::<Command>(&candidate.id)? {
                debug!(esp_id = %esp_id, command_id = command.id, "Delivered command");
                return Ok(Some(command));
            }
        }
        Ok(None)
    }

    /// Remove a queued command by id
    pub fn remove_command(&self, id: u64) -> Result<Option<Command>, QueueError> {
        let _guard = self.store.lock_key::<Command>(&id);
        Ok(self.store.delete::<Command>(&id)?)
    }

    /// Devices that polled within `within` of now
    pub fn active_devices(&self, within: Duration) -> Result<Vec<Device>, QueueError> {
        let cutoff = clock::now() - within;
        Ok(self
            .store
            .list_all::<Device>()?
            .into_iter()
            .filter(|device| device.last_request_time.is_some_and(|at| at > cutoff))
            .collect())
    }
}
