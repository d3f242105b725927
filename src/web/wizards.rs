//! One [`Wizard`] per browser session.
//!
//! The session cookie only carries a key; the wizard itself (photo bytes included) stays in
//! memory here. Wizards idle for longer than the session expiry are dropped and their
//! previews released.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tower_sessions::Session;
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::StudioError;
use crate::preview::{PreviewRegistry, generate_token};
use crate::wizard::Wizard;

const WIZARD_KEY: &str = "wizard_key";

#[derive(Debug)]
struct Slot {
    wizard: Arc<Mutex<Wizard>>,
    last_seen: Instant,
}

#[derive(Clone, Debug)]
pub(crate) struct WizardRegistry {
    slots: Arc<RwLock<HashMap<String, Slot>>>,
    idle: Duration,
}

impl WizardRegistry {
    pub(crate) fn new(idle: Duration) -> Self {
        Self {
            slots: Arc::new(RwLock::new(HashMap::new())),
            idle,
        }
    }

    /// The session's wizard, created on first use.
    pub(crate) async fn for_session(
        &self,
        session: &Session,
        catalog: &Catalog,
        previews: &PreviewRegistry,
    ) -> Result<Arc<Mutex<Wizard>>, StudioError> {
        self.prune().await;

        let key = session.get::<String>(WIZARD_KEY).await?;
        let mut slots = self.slots.write().await;
        if let Some(slot) = key.as_ref().and_then(|key| slots.get_mut(key)) {
            slot.last_seen = Instant::now();
            return Ok(slot.wizard.clone());
        }

        let key = generate_token();
        let wizard = Arc::new(Mutex::new(Wizard::new(catalog, previews.clone())));
        slots.insert(
            key.clone(),
            Slot {
                wizard: wizard.clone(),
                last_seen: Instant::now(),
            },
        );
        drop(slots);
        session.insert(WIZARD_KEY, key).await?;
        debug!("Started a new wizard");
        Ok(wizard)
    }

    /// Drops idle wizards, releasing their previews. Busy or locked wizards are kept.
    pub(crate) async fn prune(&self) {
        let mut slots = self.slots.write().await;
        let idle = self.idle;
        slots.retain(|_, slot| {
            if slot.last_seen.elapsed() < idle {
                return true;
            }
            match slot.wizard.try_lock() {
                Ok(mut wizard) if !wizard.is_busy() => {
                    wizard.reset();
                    false
                }
                _ => true,
            }
        });
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.slots.read().await.len()
    }
}
