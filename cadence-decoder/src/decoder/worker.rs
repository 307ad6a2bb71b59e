//! Decoder worker thread
//!
//! One long-lived thread per control block. It sleeps on the control block
//! condition variable until a command arrives, runs a decode session for
//! `Start`/`Seek`, acknowledges `Stop`, and exits once `quit` is set and no
//! command is pending.

use super::control::{ControlState, DecodeCommand, DecoderControl};
use super::mapper::{MusicDirectoryMapper, UriMapper};
use super::session;
use crate::error::{Error, Result};
use crate::input::{InputOpener, LocalInputOpener};
use crate::plugins::PluginRegistry;
use cadence_common::config::DecoderConfig;
use cadence_common::CadenceConfig;
use std::sync::{Arc, MutexGuard};
use std::thread;
use tracing::{debug, info};

/// Everything a decode session needs besides the control block
pub struct DecoderWorker {
    pub(crate) registry: PluginRegistry,
    pub(crate) opener: Arc<dyn InputOpener>,
    pub(crate) mapper: Arc<dyn UriMapper>,
    pub(crate) fallback_plugin: String,
}

impl DecoderWorker {
    pub fn new(
        registry: PluginRegistry,
        opener: Arc<dyn InputOpener>,
        mapper: Arc<dyn UriMapper>,
    ) -> Self {
        Self {
            registry,
            opener,
            mapper,
            fallback_plugin: DecoderConfig::default().fallback_plugin,
        }
    }

    /// Worker with the built-in plugins, local file input and the
    /// configured music directory
    pub fn from_config(config: &CadenceConfig) -> Self {
        let registry = PluginRegistry::builtin().without(&config.decoder.disabled_plugins);
        Self::new(
            registry,
            Arc::new(LocalInputOpener),
            Arc::new(MusicDirectoryMapper::new(config.music_directory.clone())),
        )
        .with_fallback_plugin(config.decoder.fallback_plugin.clone())
    }

    /// Plugin tried last for remote streams
    pub fn with_fallback_plugin(mut self, name: impl Into<String>) -> Self {
        self.fallback_plugin = name.into();
        self
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Start the worker thread for `control`
    pub fn spawn(self, control: &Arc<DecoderControl>) -> Result<()> {
        if control.is_running() {
            return Err(Error::InvalidState("decoder thread already running".to_string()));
        }
        control.lock().quit = false;

        info!(
            "Spawning decoder thread ({} plugins, fallback '{}')",
            self.registry.len(),
            self.fallback_plugin
        );

        let thread_control = Arc::clone(control);
        let handle = thread::Builder::new()
            .name("decoder".to_string())
            .spawn(move || self.run(&thread_control))?;
        control.set_thread(handle);
        Ok(())
    }

    fn run(self, control: &Arc<DecoderControl>) {
        debug!("Decoder thread started");

        let mut state = control.lock();
        loop {
            state.check_idle();

            match state.command {
                DecodeCommand::Start => {
                    state.cycle_song_metadata();
                    state = self.run_session(control, state);
                }
                DecodeCommand::Seek => {
                    // Seek while idle: restart the song at the target
                    state.start_ms = u64::try_from(state.seek_target.as_millis()).unwrap_or(u64::MAX);
                    state = self.run_session(control, state);
                }
                DecodeCommand::Stop => {
                    state.command = DecodeCommand::None;
                    control.signal();
                }
                DecodeCommand::None => {
                    if state.quit {
                        break;
                    }
                    state = control.wait(state);
                    continue;
                }
            }

            if state.command == DecodeCommand::None && state.quit {
                break;
            }
        }

        drop(state);
        debug!("Decoder thread exiting");
    }

    fn run_session<'a>(
        &self,
        control: &'a Arc<DecoderControl>,
        state: MutexGuard<'a, ControlState>,
    ) -> MutexGuard<'a, ControlState> {
        let mut state = session::run(self, control, state);
        state.command = DecodeCommand::None;
        control.signal();
        drop(state);

        control.notify_player();
        control.lock()
    }
}
