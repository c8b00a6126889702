use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info};

use crate::comments::{CommentCache, HttpCommentApi};
use crate::config::Settings;
use crate::navigation::Navigator;
use crate::notify::{Presenter, ToastCenter};
use crate::persistence::{DraftStore, Persistence, SessionStore, UserProfile};
use crate::realtime::{
    HttpClassDirectory, Identity, ManagerOptions, RealtimeManager, Subscription,
};
use crate::transport::{ApiClient, WebsocketConnector};
use crate::utils::error::Result;

/// Every service of the client, built once per process.
pub struct Classlink {
    settings: Settings,
    session: SessionStore,
    drafts: DraftStore,
    api: ApiClient,
    realtime: RealtimeManager,
    toasts: ToastCenter,
    comments: CommentCache,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Classlink {
    /// Build the client around the database at `settings.storage.path`.
    pub fn new(
        settings: Settings,
        presenter: Arc<dyn Presenter>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let persistence = Persistence::open(&settings.storage.path)?;
        Self::with_persistence(settings, persistence, presenter, navigator)
    }

    pub fn with_persistence(
        settings: Settings,
        persistence: Persistence,
        presenter: Arc<dyn Presenter>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let session = persistence.sessions()?;
        let drafts = persistence.drafts()?;
        let api = ApiClient::new(&settings.api, session.clone(), navigator.clone())?;

        let connector = WebsocketConnector::new(
            settings.realtime.url.clone(),
            Duration::from_secs(settings.api.request_timeout_secs.max(1)),
        );
        let realtime = RealtimeManager::new(
            Arc::new(connector),
            Arc::new(HttpClassDirectory::new(api.clone())),
            ManagerOptions::from(&settings.realtime),
        );

        let toasts = ToastCenter::from_settings(&settings.notifications, presenter, navigator);
        let comments = CommentCache::new(Arc::new(HttpCommentApi::new(api.clone())));
        let subscriptions = vec![toasts.attach(realtime.bus()), comments.attach(realtime.bus())];

        Ok(Self {
            settings,
            session,
            drafts,
            api,
            realtime,
            toasts,
            comments,
            subscriptions: Mutex::new(subscriptions),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn drafts(&self) -> &DraftStore {
        &self.drafts
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn realtime(&self) -> &RealtimeManager {
        &self.realtime
    }

    pub fn toasts(&self) -> &ToastCenter {
        &self.toasts
    }

    pub fn comments(&self) -> &CommentCache {
        &self.comments
    }

    /// Connect for the stored session. Returns `false` when nobody is
    /// signed in.
    pub async fn start(&self) -> Result<bool> {
        match Identity::from_session(&self.session)? {
            Some(identity) => {
                self.realtime.connect(identity).await;
                Ok(true)
            }
            None => {
                debug!("no stored session, realtime stays idle");
                Ok(false)
            }
        }
    }

    pub async fn connect_as(&self, identity: Identity) {
        self.realtime.connect(identity).await;
    }

    /// Store the session handed out by the external auth flow.
    pub fn sign_in(&self, token: &str, profile: &UserProfile) -> Result<()> {
        self.session.set_token(token)?;
        self.session.set_profile(profile)?;
        info!(user_id = profile.id, username = %profile.username, "signed in");
        Ok(())
    }

    pub fn sign_out(&self) -> Result<()> {
        self.realtime.disconnect();
        self.session.clear()
    }

    /// Process teardown: close the connection and detach the listeners.
    pub fn shutdown(&self) {
        self.realtime.disconnect();
        let subscriptions = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        debug!("client shut down");
    }
}
