//! Store and service wiring shared by all handlers.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use sabueso_auth::{Hs256TokenCodec, JwtValidator, Principal, SessionClaims, TokenError};
use sabueso_infra::{
    AccountService, AppConfig, InMemoryDatabase, InMemoryProductCatalog, InMemoryStockLedger,
    InMemoryUserDirectory, Mailer, PostgresProductCatalog, PostgresStockLedger,
    PostgresUserDirectory, ProductCatalog, StockLedger, UserDirectory,
};

#[derive(Clone)]
pub struct AppServices {
    pub ledger: Arc<dyn StockLedger>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub users: Arc<dyn UserDirectory>,
    pub accounts: AccountService,
    tokens: Hs256TokenCodec,
    session_ttl: Duration,
}

impl AppServices {
    /// In-memory stores over one shared database with the catalog
    /// attributes seeded (dev/tests).
    pub fn in_memory(config: &AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        let db = InMemoryDatabase::with_catalog_seed();
        Self::assemble(
            config,
            mailer,
            Arc::new(InMemoryStockLedger::new(db.clone())),
            Arc::new(InMemoryProductCatalog::new(db.clone())),
            Arc::new(InMemoryUserDirectory::new(db)),
        )
    }

    /// Postgres-backed stores sharing one pool.
    pub fn postgres(pool: Arc<PgPool>, config: &AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self::assemble(
            config,
            mailer,
            Arc::new(PostgresStockLedger::new(pool.clone())),
            Arc::new(PostgresProductCatalog::new(pool.clone())),
            Arc::new(PostgresUserDirectory::new(pool)),
        )
    }

    fn assemble(
        config: &AppConfig,
        mailer: Arc<dyn Mailer>,
        ledger: Arc<dyn StockLedger>,
        catalog: Arc<dyn ProductCatalog>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        let accounts = AccountService::new(users.clone(), mailer, &config.public_base_url);
        Self {
            ledger,
            catalog,
            users,
            accounts,
            tokens: Hs256TokenCodec::new(config.jwt_secret_or_dev()),
            session_ttl: config.session_ttl(),
        }
    }

    pub fn jwt_validator(&self) -> Arc<dyn JwtValidator> {
        Arc::new(self.tokens.clone())
    }

    /// Sign a session token for `principal`, returning it with its expiry.
    pub fn issue_session(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let claims = SessionClaims::for_principal(principal, now, self.session_ttl);
        let token = self.tokens.issue(&claims)?;
        Ok((token, now + self.session_ttl))
    }
}
