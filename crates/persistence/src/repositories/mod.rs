//! PostgreSQL implementations of the domain repository traits.

pub mod event;
pub mod notification;
pub mod registration;
pub mod user;
pub mod watermark;

use std::sync::Arc;

use domain::services::Repositories;
use sqlx::PgPool;

pub use event::PgEventRepository;
pub use notification::PgNotificationRepository;
pub use registration::PgRegistrationRepository;
pub use user::PgUserDirectory;
pub use watermark::PgWatermarkStore;

/// Builds every repository over one shared pool.
pub fn postgres_repositories(pool: PgPool) -> Repositories {
    Repositories {
        events: Arc::new(PgEventRepository::new(pool.clone())),
        registrations: Arc::new(PgRegistrationRepository::new(pool.clone())),
        users: Arc::new(PgUserDirectory::new(pool.clone())),
        notifications: Arc::new(PgNotificationRepository::new(pool.clone())),
        watermarks: Arc::new(PgWatermarkStore::new(pool)),
    }
}
