//! Session observation.
//!
//! An [`AuthProvider`] owns the session lifecycle; the application only
//! mirrors what the provider reports through a [`SessionObserver`].

use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tokio::sync::watch;

/// Authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Provider-assigned identifier.
    pub id: String,
    /// Contact email, if the provider exposes one.
    pub email: Option<String>,
}

impl User {
    /// Creates a user without an email.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    /// Sets the email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Email if known, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.id)
    }
}

/// Snapshot delivered to session listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Signed-in user, if any.
    pub user: Option<User>,
    /// True while the provider is still resolving the session.
    pub loading: bool,
}

impl SessionState {
    /// Initial state before the provider has reported anything.
    pub fn loading() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }

    /// Resolved state with no user.
    pub fn signed_out() -> Self {
        Self {
            user: None,
            loading: false,
        }
    }

    /// Resolved state with a user.
    pub fn signed_in(user: User) -> Self {
        Self {
            user: Some(user),
            loading: false,
        }
    }
}

/// What the application may show for a given session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionView {
    /// Provider has not resolved yet; nothing else is available.
    Loading,
    /// Resolved without a user.
    SignedOut,
    /// Resolved with a user.
    Ready(User),
}

impl From<&SessionState> for SessionView {
    fn from(state: &SessionState) -> Self {
        match (&state.user, state.loading) {
            (_, true) => Self::Loading,
            (None, false) => Self::SignedOut,
            (Some(user), false) => Self::Ready(user.clone()),
        }
    }
}

/// Callback invoked on every session transition.
pub type SessionListener = Arc<dyn Fn(&SessionState) + Send + Sync>;

/// Handle returned by [`AuthProvider::subscribe`].
///
/// Dropping the handle unsubscribes.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Wraps an unsubscribe function.
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unsubscribes now.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// External identity provider.
pub trait AuthProvider: Send + Sync {
    /// Registers a listener. The provider delivers the current state right
    /// away and then every later transition until the subscription drops.
    fn subscribe(&self, listener: SessionListener) -> Subscription;

    /// Terminates the current session.
    fn logout(&self);
}

struct Registry {
    state: SessionState,
    listeners: Vec<(u64, SessionListener)>,
    next_id: u64,
}

/// In-process identity provider.
///
/// Starts in the loading state; call [`sign_in`](Self::sign_in) or
/// [`sign_out`](Self::sign_out) once the identity is resolved.
///
/// Transitions are delivered one at a time: every listener sees states in
/// the order they were stored, and a new subscriber's initial state is never
/// delivered after a newer transition.
#[derive(Clone)]
pub struct LocalAuthProvider {
    registry: Arc<Mutex<Registry>>,
    // Held across store + delivery. Reentrant so listeners may call back in.
    delivery: Arc<ReentrantMutex<()>>,
}

impl Default for LocalAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAuthProvider {
    /// Creates a provider in the loading state.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                state: SessionState::loading(),
                listeners: Vec::new(),
                next_id: 0,
            })),
            delivery: Arc::new(ReentrantMutex::new(())),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        self.registry.lock().state.clone()
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }

    /// Marks the session as resolving, keeping the current user.
    pub fn begin_loading(&self) {
        let user = self.state().user;
        self.transition(SessionState { user, loading: true });
    }

    /// Resolves the session with a user.
    pub fn sign_in(&self, user: User) {
        tracing::debug!(user = %user.id, "session signed in");
        self.transition(SessionState::signed_in(user));
    }

    /// Resolves the session without a user.
    pub fn sign_out(&self) {
        self.transition(SessionState::signed_out());
    }

    fn transition(&self, state: SessionState) {
        let _delivery = self.delivery.lock();
        // Listeners run outside the registry lock so they may call back in.
        let listeners: Vec<SessionListener> = {
            let mut registry = self.registry.lock();
            registry.state = state.clone();
            registry.listeners.iter().map(|(_, l)| l.clone()).collect()
        };
        for listener in listeners {
            listener(&state);
        }
    }
}

impl AuthProvider for LocalAuthProvider {
    fn subscribe(&self, listener: SessionListener) -> Subscription {
        let _delivery = self.delivery.lock();
        let (id, current) = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, listener.clone()));
            (id, registry.state.clone())
        };
        listener(&current);

        let registry: Weak<Mutex<Registry>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.lock().listeners.retain(|(lid, _)| *lid != id);
            }
        })
    }

    fn logout(&self) {
        tracing::debug!("session logged out");
        self.sign_out();
    }
}

/// Mirrors the provider's session into local state.
pub struct SessionObserver {
    auth: Arc<dyn AuthProvider>,
    state: Arc<watch::Sender<SessionState>>,
    subscription: Option<Subscription>,
}

impl SessionObserver {
    /// Subscribes to `auth` and starts mirroring.
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        let (tx, _rx) = watch::channel(SessionState::loading());
        let tx = Arc::new(tx);
        let mirror = tx.clone();
        let subscription = auth.subscribe(Arc::new(move |state: &SessionState| {
            mirror.send_replace(state.clone());
        }));

        Self {
            auth,
            state: tx,
            subscription: Some(subscription),
        }
    }

    /// Latest mirrored state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// True while the provider is resolving the session.
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Signed-in user, if any.
    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    /// What the application may show right now.
    pub fn view(&self) -> SessionView {
        SessionView::from(&*self.state.borrow())
    }

    /// Waits until the provider has resolved the session.
    ///
    /// Returns the current view at once after [`teardown`](Self::teardown),
    /// since no further transitions will arrive.
    pub async fn resolved(&self) -> SessionView {
        if !self.is_subscribed() {
            return self.view();
        }
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(|state| !state.loading).await {
            Ok(state) => state.clone(),
            Err(_) => return SessionView::Loading,
        };
        SessionView::from(&state)
    }

    /// Ends the session through the provider.
    pub fn logout(&self) {
        self.auth.logout();
    }

    /// True until [`teardown`](Self::teardown) runs.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Releases the provider subscription. Later transitions are ignored.
    pub fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}
