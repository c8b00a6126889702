use serde::Deserialize;

/// Top-level configuration settings for the client.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub realtime: RealtimeSettings,
    pub notifications: NotificationSettings,
    pub comments: CommentSettings,
    pub storage: StorageSettings,
    pub log: LogSettings,
}

/// REST backend location and request policy.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Route the client navigates to after a 401.
    pub login_route: String,
}

/// Realtime endpoint and reconnect policy.
///
/// `class_resources` and `private_queues` decide which topics are derived from
/// an identity on connect.
#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeSettings {
    pub url: String,
    pub reconnect: bool,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub class_resources: Vec<String>,
    pub private_queues: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationSettings {
    pub display_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommentSettings {
    pub page_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from [`Settings::default`].
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub api: Option<PartialApiSettings>,
    pub realtime: Option<PartialRealtimeSettings>,
    pub notifications: Option<PartialNotificationSettings>,
    pub comments: Option<PartialCommentSettings>,
    pub storage: Option<PartialStorageSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialApiSettings {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub login_route: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialRealtimeSettings {
    pub url: Option<String>,
    pub reconnect: Option<bool>,
    pub reconnect_delay_ms: Option<u64>,
    pub max_reconnect_attempts: Option<u32>,
    pub class_resources: Option<Vec<String>>,
    pub private_queues: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialNotificationSettings {
    pub display_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialCommentSettings {
    pub page_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialStorageSettings {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings {
                base_url: "http://127.0.0.1:8080/api".to_string(),
                request_timeout_secs: 20,
                login_route: "/login".to_string(),
            },
            realtime: RealtimeSettings {
                url: "ws://127.0.0.1:8080/ws".to_string(),
                reconnect: true,
                reconnect_delay_ms: 1000,
                max_reconnect_attempts: 5,
                class_resources: vec![
                    "assignments".to_string(),
                    "quizzes".to_string(),
                    "attendance".to_string(),
                ],
                private_queues: vec!["approvals".to_string(), "notifications".to_string()],
            },
            notifications: NotificationSettings { display_secs: 6 },
            comments: CommentSettings { page_size: 10 },
            storage: StorageSettings {
                path: "classlink_db".to_string(),
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Settings {
    /// Fill every missing value of `partial` from the defaults.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();
        let api = partial.api.unwrap_or_default();
        let realtime = partial.realtime.unwrap_or_default();
        let notifications = partial.notifications.unwrap_or_default();
        let comments = partial.comments.unwrap_or_default();
        let storage = partial.storage.unwrap_or_default();
        let log = partial.log.unwrap_or_default();

        Self {
            api: ApiSettings {
                base_url: api.base_url.unwrap_or(default.api.base_url),
                request_timeout_secs: api
                    .request_timeout_secs
                    .unwrap_or(default.api.request_timeout_secs),
                login_route: api.login_route.unwrap_or(default.api.login_route),
            },
            realtime: RealtimeSettings {
                url: realtime.url.unwrap_or(default.realtime.url),
                reconnect: realtime.reconnect.unwrap_or(default.realtime.reconnect),
                reconnect_delay_ms: realtime
                    .reconnect_delay_ms
                    .unwrap_or(default.realtime.reconnect_delay_ms),
                max_reconnect_attempts: realtime
                    .max_reconnect_attempts
                    .unwrap_or(default.realtime.max_reconnect_attempts),
                class_resources: realtime
                    .class_resources
                    .unwrap_or(default.realtime.class_resources),
                private_queues: realtime
                    .private_queues
                    .unwrap_or(default.realtime.private_queues),
            },
            notifications: NotificationSettings {
                display_secs: notifications
                    .display_secs
                    .unwrap_or(default.notifications.display_secs),
            },
            comments: CommentSettings {
                page_size: comments.page_size.unwrap_or(default.comments.page_size),
            },
            storage: StorageSettings {
                path: storage.path.unwrap_or(default.storage.path),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
        }
    }
}
