//! Application state: in-memory document stores and the credential validator.
//!
//! This module owns:
//!   - the form store (by id)
//!   - the response store (by id)
//!   - the saved-progress store (by resume token)
//!   - the credential validator injected at the composition root
//!
//! Stores are plain maps behind `tokio::sync::RwLock`. Every request clones
//! the documents it needs out of the store, so no evaluation or validation
//! ever runs while a lock is held.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{error, info, instrument};

use crate::auth::{CredentialValidator, TokenValidator};
use crate::config::{load_app_config_from_env, AppConfig};
use crate::domain::{Form, ResponseRecord, SavedProgress};
use crate::seeds::seed_forms;

#[derive(Clone)]
pub struct AppState {
    pub forms: Arc<RwLock<HashMap<String, Form>>>,
    pub responses: Arc<RwLock<HashMap<String, ResponseRecord>>>,
    pub progress: Arc<RwLock<HashMap<String, SavedProgress>>>,
    pub validator: Arc<dyn CredentialValidator>,
}

impl AppState {
    /// Build state from env: load TOML config, seed the form store, and wire
    /// up the credential validator.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        Self::from_config(load_app_config_from_env())
    }

    /// Build state from an already-loaded config (tests pass one directly).
    pub fn from_config(cfg: Option<AppConfig>) -> Self {
        let mut forms = HashMap::<String, Form>::new();
        let mut configured = 0usize;

        // Insert config-based forms (if any). Entries that fail authoring
        // validation are skipped so one bad document can't poison the bank.
        if let Some(cfg) = &cfg {
            for form in &cfg.forms {
                if let Err(e) = form.validate() {
                    error!(target: "form", id = %form.id, error = %e, "Skipping bank form: failed validation");
                    continue;
                }
                if forms.contains_key(&form.id) {
                    error!(target: "form", id = %form.id, "Skipping bank form: duplicate id");
                    continue;
                }
                forms.insert(form.id.clone(), form.clone());
                configured += 1;
            }
        }

        // Always insert built-in seeds, but don't overwrite configured ids.
        let mut seeded = 0usize;
        for form in seed_forms() {
            forms.entry(form.id.clone()).or_insert_with(|| {
                seeded += 1;
                form
            });
        }

        info!(target: "form", configured, seeded, total = forms.len(), "Startup form inventory");

        // Credential validator: configured tokens, or a minted dev token so a
        // fresh checkout is usable without config.
        let credentials: Vec<_> = cfg
            .map(|c| c.credentials.into_iter().map(|cr| (cr.token, cr.user)).collect())
            .unwrap_or_default();
        let validator: Arc<dyn CredentialValidator> = if credentials.is_empty() {
            Arc::new(TokenValidator::with_dev_credential())
        } else {
            info!(target: "formlet_backend", count = credentials.len(), "Using configured credentials");
            Arc::new(TokenValidator::new(credentials))
        };

        Self {
            forms: Arc::new(RwLock::new(forms)),
            responses: Arc::new(RwLock::new(HashMap::new())),
            progress: Arc::new(RwLock::new(HashMap::new())),
            validator,
        }
    }

    /// Insert or replace a form document.
    #[instrument(level = "debug", skip(self, form), fields(id = %form.id))]
    pub async fn insert_form(&self, form: Form) {
        self.forms.write().await.insert(form.id.clone(), form);
    }

    /// Read-only access to a form by id.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_form(&self, id: &str) -> Option<Form> {
        self.forms.read().await.get(id).cloned()
    }

    /// All forms owned by one user, newest first.
    #[instrument(level = "debug", skip(self), fields(%user_id))]
    pub async fn forms_for_user(&self, user_id: &str) -> Vec<Form> {
        let forms = self.forms.read().await;
        let mut owned: Vec<Form> = forms.values().filter(|f| f.user_id == user_id).cloned().collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        owned
    }

    /// Remove a form by id. Returns the removed document, if any.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn remove_form(&self, id: &str) -> Option<Form> {
        self.forms.write().await.remove(id)
    }

    /// Store a submitted response and bump its form's response count.
    #[instrument(level = "debug", skip(self, response), fields(id = %response.id, form_id = %response.form_id))]
    pub async fn record_response(&self, response: ResponseRecord) {
        let form_id = response.form_id.clone();
        self.responses.write().await.insert(response.id.clone(), response);
        if let Some(form) = self.forms.write().await.get_mut(&form_id) {
            form.response_count += 1;
        }
    }

    /// All responses submitted to one form, newest first.
    #[instrument(level = "debug", skip(self), fields(%form_id))]
    pub async fn responses_for_form(&self, form_id: &str) -> Vec<ResponseRecord> {
        let responses = self.responses.read().await;
        let mut out: Vec<ResponseRecord> =
            responses.values().filter(|r| r.form_id == form_id).cloned().collect();
        out.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        out
    }

    /// Park saved progress under its resume token.
    #[instrument(level = "debug", skip(self, progress), fields(id = %progress.id, form_id = %progress.form_id))]
    pub async fn insert_progress(&self, progress: SavedProgress) {
        self.progress.write().await.insert(progress.resume_token.clone(), progress);
    }

    /// Look up saved progress by resume token.
    #[instrument(level = "debug", skip(self, token))]
    pub async fn get_progress(&self, token: &str) -> Option<SavedProgress> {
        self.progress.read().await.get(token).cloned()
    }

    /// Drop saved progress (used once it expires).
    #[instrument(level = "debug", skip(self, token))]
    pub async fn remove_progress(&self, token: &str) -> Option<SavedProgress> {
        self.progress.write().await.remove(token)
    }
}
