use clap::Parser;
use kube::CustomResourceExt;
use tracing_subscriber::EnvFilter;
use webhook_secret_operator::{config::Config, crds::WebhookSecret};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
enum Args {
    /// Run the operator
    Run(Config),
    /// Print the WebhookSecret CRD
    Crds,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args {
        Args::Crds => {
            println!("{}", serde_yaml::to_string(&WebhookSecret::crd())?);
        }
        Args::Run(config) => {
            let filter = EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_filter))?;
            tracing_subscriber::fmt().with_env_filter(filter).init();

            webhook_secret_operator::run(config).await?;
        }
    };

    Ok(())
}
