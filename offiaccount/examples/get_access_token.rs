use clap::Parser;
use offiaccount::{Client, ClientConfig};
use reqwest::Url;

#[derive(Debug, Parser)]
struct Opts {
    /// The application ID
    #[arg(short, long, env = "OFFIACCOUNT_APP_ID")]
    app_id: String,

    /// The application secret used to identify the application to the issuer
    #[arg(short = 's', long, env = "OFFIACCOUNT_SECRET", hide_env_values = true)]
    secret: String,

    /// The host serving both the issuer and the platform API
    #[arg(long, env = "OFFIACCOUNT_BASE_URL")]
    base_url: Option<Url>,

    /// A platform path to call with the token, e.g. `/cgi-bin/get_api_domain_ip`
    #[arg(short, long)]
    path: Option<String>,

    /// Obtain a new token even if the cached one is still fresh
    #[arg(long)]
    force_refresh: bool,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let mut config = ClientConfig::new(opts.app_id, opts.secret);
    if let Some(base_url) = opts.base_url {
        config.base_url = base_url;
    }

    let client = Client::from_config(&config)?;

    let token = client.access_token().await?;
    tracing::info!(%token, "obtained access token");

    if opts.force_refresh {
        let token = client.force_refresh_access_token().await?;
        tracing::info!(%token, "forced a new access token");
    }

    if let Some(path) = opts.path {
        let body = client.http_get(&path).await?;
        println!("{}", String::from_utf8_lossy(&body));
    }

    Ok(())
}
