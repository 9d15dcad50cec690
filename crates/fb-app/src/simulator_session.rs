//! Episode-oriented wrapper around a session.

use std::path::Path;

use fb_model::{Approver, InterfaceDescriptor};
use fb_sim::{BackendProvider, LoadOptions, Observation, Session, Values};
use tracing::info;

use crate::error::AppResult;

/// A loaded model driven in episodes: start, step, observe.
pub struct SimulatorSession {
    session: Session,
    env_name: String,
    config: Values,
}

impl SimulatorSession {
    /// Load and initialize a model.
    pub fn open(
        provider: &dyn BackendProvider,
        model_path: &Path,
        options: &LoadOptions,
        approver: &mut dyn Approver,
    ) -> AppResult<Self> {
        let session = Session::load(provider, model_path, options, approver)?;
        Self::from_session(session)
    }

    /// Wrap an already loaded session, initializing it.
    pub fn from_session(mut session: Session) -> AppResult<Self> {
        session.initialize_model(None)?;
        let env_name = format!("{} FMU", session.model_name());
        info!(env = %env_name, "simulator ready");
        Ok(Self {
            session,
            env_name,
            config: Values::new(),
        })
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    /// Config of the current episode.
    pub fn config(&self) -> &Values {
        &self.config
    }

    pub fn interface(&self) -> &InterfaceDescriptor {
        self.session.interface()
    }

    /// Reset the model with this episode's config.
    pub fn episode_start(&mut self, config: Values) -> AppResult<()> {
        self.session.reset(Some(&config))?;
        self.config = config;
        Ok(())
    }

    /// Apply an action and advance one macro step.
    pub fn episode_step(&mut self, action: &Values) -> AppResult<()> {
        self.session.apply_actions(action)?;
        self.session.step()?;
        Ok(())
    }

    /// Every observed state variable plus the reserved fields.
    pub fn state(&mut self) -> AppResult<Observation> {
        Ok(self.session.read_all()?)
    }

    pub fn halted(&self) -> bool {
        self.session.halted()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn close(mut self) -> AppResult<()> {
        self.session.close()?;
        Ok(())
    }
}
