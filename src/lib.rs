use std::sync::Arc;

use config::Config;
use pager::PagerRegistry;
use store::DocumentStore;
use token::TokenCodec;

pub mod config;
pub mod error;
pub mod middleware;
pub mod pager;
pub mod routes;
pub mod store;
pub mod token;
pub mod utils;
pub mod views;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Config,
    pub codec: Arc<TokenCodec>,
    pub pagers: Arc<PagerRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: Config) -> Self {
        let codec = Arc::new(TokenCodec::new(&config.token_secret));
        let pagers = Arc::new(PagerRegistry::new(
            store.clone(),
            config.default_page_size,
            config.token_expiration(),
        ));
        Self {
            store,
            config,
            codec,
            pagers,
        }
    }
}
