use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smart_worksheet::config::AppConfig;
use smart_worksheet::feedback::{FeedbackGenerator, OpenAiClient};
use smart_worksheet::mail::{SmtpMailer, SubmissionNotifier};
use smart_worksheet::session::SessionStore;
use smart_worksheet::state::AppState;
use smart_worksheet::store::{GoogleSheetsStore, ServiceAccountKey};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "smart_worksheet=debug,tower_http=debug".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = match AppConfig::load() {
    Ok(config) => config,
    Err(e) => {
      tracing::error!("Configuration error: {}", e);
      std::process::exit(1);
    }
  };
  tracing::debug!("Loaded configuration: {:?}", config);

  let key = match ServiceAccountKey::from_json(&config.sheets.credentials_json) {
    Ok(key) => key,
    Err(e) => {
      tracing::error!("{}", e);
      std::process::exit(1);
    }
  };
  let store = GoogleSheetsStore::new(
    reqwest::Client::new(),
    config.sheets.api_base.clone(),
    key,
    config.sheets.spreadsheet_id.clone(),
    config.sheets.range.clone(),
  );

  let completion = match OpenAiClient::new(
    config.openai.api_key.clone(),
    config.openai.base_url.clone(),
    config.openai.timeout,
  ) {
    Ok(client) => client,
    Err(e) => {
      tracing::error!("Failed to build completion client: {}", e);
      std::process::exit(1);
    }
  };

  let mailer = SmtpMailer::new(
    config.email.address.clone(),
    config.email.password.clone(),
    config.email.smtp_host.clone(),
    config.email.smtp_port,
    config.email.timeout,
  );

  let state = AppState::new(
    Arc::new(store),
    FeedbackGenerator::new(Arc::new(completion), config.openai.model.clone(), config.retry),
    SubmissionNotifier::new(Arc::new(mailer), config.retry),
    SessionStore::new(config.session_expiry),
  );

  spawn_session_purge(state.sessions.clone());

  let app = smart_worksheet::build_router(state);

  let bind_addr = config.server.bind_addr();
  let listener = tokio::net::TcpListener::bind(&bind_addr)
    .await
    .unwrap_or_else(|_| panic!("Failed to bind to {}", bind_addr));

  tracing::info!("Server running on http://localhost:{}", config.server.port);

  axum::serve(listener, app)
    .await
    .expect("Server failed to start");
}

/// Periodically drop expired sessions that nobody revisits.
fn spawn_session_purge(sessions: SessionStore) {
  tokio::spawn(async move {
    let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
    loop {
      interval.tick().await;
      let purged = sessions.purge_expired();
      if purged > 0 {
        tracing::debug!("Purged {} expired sessions, {} active", purged, sessions.len());
      }
    }
  });
}
