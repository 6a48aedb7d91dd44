use portal_admin::error::AdminError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal_admin=info,portal_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = portal_admin::load_config();
    if let Err(err) = portal_admin::run(std::env::args().skip(1), &config).await {
        match &err {
            AdminError::Rejected(errors) => {
                eprintln!("rejected:");
                for (field, message) in errors.iter() {
                    eprintln!("  {field}: {message}");
                }
            }
            other => eprintln!("error: {other}"),
        }
        std::process::exit(portal_admin::exit_code(&err));
    }
}
