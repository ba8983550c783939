//! In-memory persistence for products, sales and users.
//!
//! Each collection sits behind its own async `RwLock`. Lookups are keyed by
//! opaque string ids; a string that is not a UUID is an
//! [`StoreError::InvalidId`], a well-formed id with no record behind it is
//! [`StoreError::NotFound`]. Handlers map these sentinels to request errors.

pub mod product;
pub mod user;

use std::time::Duration;

use chrono::{DateTime, TimeZone as _, Utc};
use uuid::Uuid;

pub use product::{MAX_AMOUNT, NewProduct, NewSale, Product, Products, Sale, UpdateProduct};
pub use user::{NewUser, User, Users};

use crate::auth::{ROLE_ADMIN, ROLE_USER};

/// How long a readiness probe may wait on the store's locks.
const STATUS_CHECK_TIMEOUT: Duration = Duration::from_secs(1);

/// Password of both seeded accounts.
pub const SEED_PASSWORD: &str = "gophers";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid ID")]
    InvalidId,

    #[error("not found")]
    NotFound,

    #[error("attempted action is not allowed")]
    Forbidden,

    #[error("authentication failed")]
    AuthenticationFailure,

    #[error("email {0:?} is already registered")]
    DuplicateEmail(String),

    #[error("hashing password: {0}")]
    Hash(String),

    #[error("store is not accepting requests")]
    Unavailable,
}

/// Parses an opaque record id.
pub(crate) fn parse_id(id: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(id).map_err(|_| StoreError::InvalidId)
}

/// Every collection the service reads and writes.
#[derive(Default)]
pub struct Store {
    pub products: Products,
    pub users: Users,
}

impl Store {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the sample catalogue and two accounts,
    /// `admin@example.com` (ADMIN, USER) and `user@example.com` (USER), both
    /// with the password [`SEED_PASSWORD`].
    pub async fn seeded() -> Result<Self, StoreError> {
        let store = Self::new();
        let admin_id = Uuid::from_u128(0x5cf37266_3473_4006_984f_9325122678b7);
        let user_id = Uuid::from_u128(0x45b5fbd3_755f_4379_8f07_a58d4a30fa2f);
        let joined = at(2019, 3, 24, 0);

        store
            .users
            .insert_with_id(
                admin_id,
                NewUser::new("Admin Gopher", "admin@example.com", [ROLE_ADMIN, ROLE_USER], SEED_PASSWORD),
                joined,
            )
            .await?;
        store
            .users
            .insert_with_id(
                user_id,
                NewUser::new("User Gopher", "user@example.com", [ROLE_USER], SEED_PASSWORD),
                joined,
            )
            .await?;

        let comics = Uuid::from_u128(0xa2b0639f_2cc6_44b8_b97b_15d69dbb511e);
        let toys = Uuid::from_u128(0x72f8b983_3eb4_48db_9ed0_e45cc6bd716b);
        let owner = admin_id.to_string();

        store
            .products
            .insert_with_id(comics, &owner, NewProduct::new("Comic Books", 50, 42), at(2019, 1, 1, 1))
            .await;
        store
            .products
            .insert_with_id(toys, &owner, NewProduct::new("McDonalds Toys", 75, 120), at(2019, 1, 1, 2))
            .await;

        let comics = comics.to_string();
        let toys = toys.to_string();
        store.products.add_sale(&comics, NewSale { quantity: 2, paid: 100 }, at(2019, 1, 1, 3)).await?;
        store.products.add_sale(&comics, NewSale { quantity: 5, paid: 250 }, at(2019, 1, 1, 4)).await?;
        store.products.add_sale(&toys, NewSale { quantity: 3, paid: 225 }, at(2019, 1, 1, 5)).await?;

        tracing::debug!("store seeded");
        Ok(store)
    }

    /// Succeeds when every collection can be read.
    pub async fn status_check(&self) -> Result<(), StoreError> {
        let probe = async {
            self.products.ping().await;
            self.users.ping().await;
        };
        tokio::time::timeout(STATUS_CHECK_TIMEOUT, probe)
            .await
            .map_err(|_| StoreError::Unavailable)
    }
}

fn at(year: i32, month: u32, day: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, second)
        .single()
        .unwrap_or_default()
}
