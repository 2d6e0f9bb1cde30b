//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use opsdeck::{Console, ConsoleConfig};
use opsdeck_core::{Actor, ActorId, RequestContext, Role};
use opsdeck_exec::ScriptSpec;
use opsdeck_perms::CipherKey;
use opsdeck_store::MemoryStore;

use crate::spy::{SpySpawner, SpyStore, StaticProber};

/// Fixed 256-bit key for tests.
pub const TEST_KEY_HEX: &str = "4f70736465636b2074657374206b6579206e6f7420666f722070726f64212121";

/// An actor with a readable name derived from the role.
pub fn actor(role: Role) -> Actor {
    Actor::new(ActorId::generate(), role.as_str().to_lowercase(), role)
}

/// A request context for a fresh actor in `role`, from loopback.
pub fn ctx(role: Role) -> RequestContext {
    RequestContext::new(actor(role), Some([127, 0, 0, 1].into()))
}

/// A `ScriptSpec` running `command` through `/bin/sh -c`.
pub fn sh_script(command: &str) -> ScriptSpec {
    ScriptSpec::new("/bin/sh").args(["-c", command])
}

/// The store type used by [`TestConsole`].
pub type SpyMemoryStore = Arc<SpyStore<MemoryStore>>;

/// A console over a spied in-memory store, with a counting spawner and a
/// static prober (reachable by default).
pub struct TestConsole {
    pub console: Console<SpyMemoryStore>,
    pub store: SpyMemoryStore,
    pub spawner: Arc<SpySpawner>,
    pub prober: Arc<StaticProber>,
}

impl TestConsole {
    pub fn new() -> Self {
        Self::with_config(ConsoleConfig::default())
    }

    pub fn with_scripts<I, K>(scripts: I) -> Self
    where
        I: IntoIterator<Item = (K, ScriptSpec)>,
        K: Into<String>,
    {
        let config = ConsoleConfig {
            scripts: scripts.into_iter().map(|(k, s)| (k.into(), s)).collect(),
            ..ConsoleConfig::default()
        };
        Self::with_config(config)
    }

    pub fn with_config(config: ConsoleConfig) -> Self {
        let store = Arc::new(SpyStore::new(MemoryStore::new()));
        let spawner = Arc::new(SpySpawner::new());
        let prober = Arc::new(StaticProber::new(true));

        let key = CipherKey::from_hex(TEST_KEY_HEX).expect("test key is valid hex");
        let console = Console::builder(store.clone())
            .config(config)
            .cipher_key(key)
            .spawner(spawner.clone())
            .prober(prober.clone())
            .build()
            .expect("test console builds");

        Self {
            console,
            store,
            spawner,
            prober,
        }
    }
}

impl Default for TestConsole {
    fn default() -> Self {
        Self::new()
    }
}
