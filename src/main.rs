//! sales-api: serves the sales API and its debug service.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use garagesale::api::{self, Api};
use garagesale::auth::{self, AuthError, Authenticator, KeySet};
use garagesale::config::{Config, ConfigError};
use garagesale::middleware::Registry;
use garagesale::store::{Store, StoreError};
use garagesale::{Server, ServerError};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("reading key file {}: {source}", .path.display())]
    ReadKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("auth: {0}")]
    Auth(#[from] AuthError),

    #[error("seeding store: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    init_logging(config.verbose);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    config.validate()?;

    let authenticator = Arc::new(authenticator(&config)?);
    info!(kid = authenticator.active_kid(), algorithm = ?authenticator.algorithm(), "authenticator ready");

    let store = Arc::new(Store::seeded().await?);
    let registry = Arc::new(Registry::new());

    let debug = Server::bind(config.debug_address).serve(api::debug_routes(Arc::clone(&registry)));
    tokio::spawn(async move {
        if let Err(e) = debug.await {
            error!("debug service: {e}");
        }
    });

    let app = api::routes(
        Api { store, authenticator, token_ttl: config.token_ttl() },
        registry,
    );

    Server::bind(config.address)
        .with_shutdown_timeout(config.shutdown_timeout())
        .serve(app)
        .await?;
    Ok(())
}

fn authenticator(config: &Config) -> Result<Authenticator, StartupError> {
    let algorithm = auth::parse_algorithm(&config.auth_algorithm)?;

    let signing = auth::encoding_key(algorithm, &read_key(&config.auth_private_key_file)?)?;
    let mut keys = KeySet::single(
        config.auth_key_id.clone(),
        auth::decoding_key(algorithm, &read_key(&config.auth_public_key_file)?)?,
    );
    for rotated in &config.auth_rotated_keys {
        keys = keys.with(rotated.kid.clone(), auth::decoding_key(algorithm, &read_key(&rotated.path)?)?);
    }

    Ok(Authenticator::new(signing, config.auth_key_id.clone(), &config.auth_algorithm, keys)?)
}

fn read_key(path: &Path) -> Result<Vec<u8>, StartupError> {
    std::fs::read(path).map_err(|source| StartupError::ReadKey { path: path.to_owned(), source })
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose { "garagesale=debug,sales_api=debug" } else { "garagesale=info,sales_api=info" };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| env_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
