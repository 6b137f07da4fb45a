//! Context system — what the copilot knows about the console right now.
//!
//! A context snapshot has two conventional slots:
//!
//! 1. **`system`** — operator identity, timestamp, environment name and the
//!    current page route
//! 2. **`activeView`** — a page-specific snapshot supplied by whichever page
//!    last registered a [`PageContextSource`]
//!
//! Pages register through a [`PageContextSlot`] owned by the [`ConsoleShell`]
//! application object. Registration hands back a [`PageContextGuard`]; when
//! the guard is dropped the slot is cleared only if that registration still
//! owns it, so a page tearing down late never wipes the page that replaced it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ContextError;

/// Default time a page getter gets before its snapshot is replaced by an error marker.
pub const DEFAULT_PAGE_CONTEXT_TIMEOUT: Duration = Duration::from_secs(5);

/// The logged-in console operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorIdentity {
    pub id: String,
    pub name: String,
    pub role: String,
}

impl Default for OperatorIdentity {
    fn default() -> Self {
        Self {
            id: "op-0001".into(),
            name: "Console Operator".into(),
            role: "admin".into(),
        }
    }
}

/// The page currently shown by the console router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRoute {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub meta: Value,
}

impl PageRoute {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            meta: Value::Object(Map::new()),
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }
}

impl Default for PageRoute {
    fn default() -> Self {
        Self::new("/dashboard", "Dashboard")
    }
}

/// Shared router state: written by navigation, read by context assembly.
#[derive(Debug, Clone, Default)]
pub struct RouteState {
    current: Arc<RwLock<PageRoute>>,
}

impl RouteState {
    pub fn new(initial: PageRoute) -> Self {
        Self {
            current: Arc::new(RwLock::new(initial)),
        }
    }

    /// Snapshot of the current route.
    pub fn current(&self) -> PageRoute {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Move the router to `route`.
    pub fn navigate(&self, route: PageRoute) {
        debug!(path = %route.path, "Route changed");
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = route;
    }
}

/// A page's answer to "what are you showing right now?".
#[async_trait]
pub trait PageContextSource: Send + Sync {
    async fn snapshot(&self) -> Result<Value, ContextError>;
}

/// Adapter turning an async closure into a [`PageContextSource`].
pub struct FnPageSource<F> {
    getter: F,
}

#[async_trait]
impl<F> PageContextSource for FnPageSource<F>
where
    F: Fn() -> BoxFuture<'static, Result<Value, ContextError>> + Send + Sync,
{
    async fn snapshot(&self) -> Result<Value, ContextError> {
        (self.getter)().await
    }
}

/// Wrap an async getter as a shareable page source.
pub fn page_source<F>(getter: F) -> Arc<dyn PageContextSource>
where
    F: Fn() -> BoxFuture<'static, Result<Value, ContextError>> + Send + Sync + 'static,
{
    Arc::new(FnPageSource { getter })
}

#[derive(Default)]
struct SlotState {
    next_token: u64,
    active: Option<(u64, Arc<dyn PageContextSource>)>,
}

/// Holds at most one active page-context source.
#[derive(Clone, Default)]
pub struct PageContextSlot {
    state: Arc<Mutex<SlotState>>,
}

impl PageContextSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `source` the active provider, replacing any previous one.
    pub fn register(&self, source: Arc<dyn PageContextSource>) -> PageContextGuard {
        let mut state = self.lock();
        state.next_token += 1;
        let token = state.next_token;
        state.active = Some((token, source));
        debug!(token, "Page context registered");
        PageContextGuard {
            slot: self.clone(),
            token,
            released: false,
        }
    }

    /// Clear the slot if `token` still owns it. Returns whether it did.
    pub fn clear_if_owner(&self, token: u64) -> bool {
        let mut state = self.lock();
        match &state.active {
            Some((owner, _)) if *owner == token => {
                state.active = None;
                debug!(token, "Page context cleared");
                true
            }
            _ => {
                debug!(token, "Stale page context release ignored");
                false
            }
        }
    }

    /// The currently active source, if any.
    pub fn active(&self) -> Option<Arc<dyn PageContextSource>> {
        self.lock().active.as_ref().map(|(_, source)| source.clone())
    }

    pub fn is_registered(&self) -> bool {
        self.lock().active.is_some()
    }
}

/// Ownership handle for a page-context registration.
///
/// Dropping the guard (or calling [`PageContextGuard::release`]) clears the
/// slot only while this registration is still the active one.
pub struct PageContextGuard {
    slot: PageContextSlot,
    token: u64,
    released: bool,
}

impl PageContextGuard {
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Explicitly tear down the registration.
    pub fn release(mut self) -> bool {
        self.released = true;
        self.slot.clear_if_owner(self.token)
    }
}

impl Drop for PageContextGuard {
    fn drop(&mut self) {
        if !self.released {
            self.slot.clear_if_owner(self.token);
        }
    }
}

/// The top-level console application object.
///
/// Owns the shared router state and the page-context slot and is passed
/// explicitly to whatever needs them (tools, the context provider, pages).
#[derive(Clone, Default)]
pub struct ConsoleShell {
    pub routes: RouteState,
    pub pages: PageContextSlot,
}

impl ConsoleShell {
    pub fn new(initial: PageRoute) -> Self {
        Self {
            routes: RouteState::new(initial),
            pages: PageContextSlot::new(),
        }
    }

    /// Register the calling page's snapshot getter.
    pub fn set_page_context(&self, source: Arc<dyn PageContextSource>) -> PageContextGuard {
        self.pages.register(source)
    }
}

/// Identity and environment facts for one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub operator: OperatorIdentity,
    pub current_page: PageRoute,
}

/// The context bag embedded in every prompt of a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContext {
    pub system: SystemSnapshot,

    pub active_view: Value,

    /// Output of the tool executed in the previous loop iteration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<Value>,

    /// Tool output handed to a recursive `ask` call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_execution_result: Option<Value>,

    /// Any further caller-supplied keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentContext {
    pub fn new(system: SystemSnapshot, active_view: Value) -> Self {
        Self {
            system,
            active_view,
            tool_result: None,
            tool_execution_result: None,
            extra: Map::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.extra.insert(key.into(), value);
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Pretty-printed JSON dump for prompts.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".into())
    }
}

/// Assembles [`AgentContext`] snapshots.
pub struct ContextProvider {
    operator: OperatorIdentity,
    environment: String,
    shell: ConsoleShell,
    getter_timeout: Duration,
}

impl ContextProvider {
    pub fn new(operator: OperatorIdentity, environment: impl Into<String>, shell: ConsoleShell) -> Self {
        Self {
            operator,
            environment: environment.into(),
            shell,
            getter_timeout: DEFAULT_PAGE_CONTEXT_TIMEOUT,
        }
    }

    /// Set how long a page getter may take.
    pub fn with_getter_timeout(mut self, timeout: Duration) -> Self {
        self.getter_timeout = timeout;
        self
    }

    pub fn shell(&self) -> &ConsoleShell {
        &self.shell
    }

    /// Build a fresh snapshot. Never fails: a missing page getter yields a
    /// neutral placeholder, a failing or slow one yields `{"error": ...}`.
    pub async fn global_context(&self) -> AgentContext {
        let current_page = self.shell.routes.current();
        let active_view = match self.shell.pages.active() {
            None => json!({
                "page": current_page.path,
                "note": "No page-specific context is available for this view",
            }),
            Some(source) => match tokio::time::timeout(self.getter_timeout, source.snapshot()).await {
                Ok(Ok(snapshot)) => snapshot,
                Ok(Err(e)) => {
                    warn!(error = %e, "Page context getter failed");
                    json!({ "error": e.to_string() })
                }
                Err(_) => {
                    let e = ContextError::Timeout(self.getter_timeout.as_secs());
                    warn!(error = %e, "Page context getter timed out");
                    json!({ "error": e.to_string() })
                }
            },
        };

        AgentContext::new(
            SystemSnapshot {
                timestamp: Utc::now(),
                environment: self.environment.clone(),
                operator: self.operator.clone(),
                current_page,
            },
            active_view,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn fixed(value: Value) -> Arc<dyn PageContextSource> {
        page_source(move || {
            let value = value.clone();
            async move { Ok(value) }.boxed()
        })
    }

    fn provider(shell: &ConsoleShell) -> ContextProvider {
        ContextProvider::new(OperatorIdentity::default(), "staging", shell.clone())
    }

    #[tokio::test]
    async fn snapshot_without_page_uses_placeholder() {
        let shell = ConsoleShell::default();
        let ctx = provider(&shell).global_context().await;
        assert_eq!(ctx.system.environment, "staging");
        assert_eq!(ctx.system.current_page.path, "/dashboard");
        assert!(ctx.active_view["note"].is_string());
        assert!(ctx.active_view.get("error").is_none());
    }

    #[tokio::test]
    async fn snapshot_includes_registered_page_data() {
        let shell = ConsoleShell::default();
        let _guard = shell.set_page_context(fixed(json!({"onlineDevices": 41})));
        let ctx = provider(&shell).global_context().await;
        assert_eq!(ctx.active_view["onlineDevices"], 41);
    }

    #[tokio::test]
    async fn failing_getter_becomes_error_marker() {
        let shell = ConsoleShell::default();
        let _guard = shell.set_page_context(page_source(|| {
            async { Err(ContextError::GetterFailed("device list request rejected".into())) }.boxed()
        }));
        let ctx = provider(&shell).global_context().await;
        assert!(ctx.active_view["error"].as_str().unwrap().contains("rejected"));
    }

    #[tokio::test]
    async fn slow_getter_becomes_error_marker() {
        tokio::time::pause();
        let shell = ConsoleShell::default();
        let _guard = shell.set_page_context(page_source(|| {
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(json!({}))
            }
            .boxed()
        }));
        let ctx = provider(&shell)
            .with_getter_timeout(Duration::from_secs(1))
            .global_context()
            .await;
        assert!(ctx.active_view["error"].as_str().unwrap().contains("timed out"));
    }

    #[test]
    fn older_page_teardown_does_not_clear_newer_registration() {
        let shell = ConsoleShell::default();
        let page_a = shell.set_page_context(fixed(json!({"page": "a"})));
        let page_b = shell.set_page_context(fixed(json!({"page": "b"})));

        drop(page_a);
        assert!(shell.pages.is_registered());

        assert!(page_b.release());
        assert!(!shell.pages.is_registered());
    }

    #[tokio::test]
    async fn newer_registration_answers_after_stale_release() {
        let shell = ConsoleShell::default();
        let page_a = shell.set_page_context(fixed(json!({"page": "a"})));
        let _page_b = shell.set_page_context(fixed(json!({"page": "b"})));
        assert!(!page_a.release());

        let ctx = provider(&shell).global_context().await;
        assert_eq!(ctx.active_view["page"], "b");
    }

    #[test]
    fn route_state_is_shared_between_clones() {
        let shell = ConsoleShell::default();
        let routes = shell.routes.clone();
        routes.navigate(PageRoute::new("/devices", "Devices"));
        assert_eq!(shell.routes.current().path, "/devices");
    }

    #[test]
    fn context_serializes_conventional_slot_names() {
        let mut ctx = AgentContext::new(
            SystemSnapshot {
                timestamp: Utc::now(),
                environment: "prod".into(),
                operator: OperatorIdentity::default(),
                current_page: PageRoute::default(),
            },
            json!({}),
        );
        ctx.tool_result = Some(json!({"x": 1}));
        ctx.insert("locale", json!("en-US"));

        let value = ctx.to_value();
        assert!(value.get("activeView").is_some());
        assert!(value["system"].get("currentPage").is_some());
        assert_eq!(value["toolResult"]["x"], 1);
        assert_eq!(value["locale"], "en-US");
        assert!(value.get("toolExecutionResult").is_none());
    }
}
