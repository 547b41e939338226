//! # sealctl
//!
//! Command-line front end for the same pipeline the web form uses.
//!
//! ## Usage
//!
//! ```bash
//! # Check an env file without touching the cluster
//! sealctl validate --file .env
//!
//! # Seal an env file into the payments namespace and write the result
//! sealctl seal --file .env --namespace payments --output payments-sealed.yaml
//!
//! # Seal offline with the controller's public certificate
//! sealctl seal --file .env --cert pub-cert.pem
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sealed_secret_generator::config::{LogFormat, ServerConfig};
use sealed_secret_generator::constants::DEFAULT_NAMESPACE;
use sealed_secret_generator::namespaces::{KubeNamespaceSource, NamespaceSource, StaticNamespaces};
use sealed_secret_generator::observability::logging;
use sealed_secret_generator::pipeline::{
    validate, Pipeline, SecretManifestBuilder, SecretSealer, WorkingStorage,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Turn KEY=VALUE env files into SealedSecret manifests
#[derive(Parser)]
#[command(name = "sealctl")]
#[command(about = "Turn KEY=VALUE env files into SealedSecret manifests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an env file and list its keys
    Validate {
        /// Env file to check
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Validate, build and seal an env file
    Seal {
        /// Env file to seal
        #[arg(short, long)]
        file: PathBuf,

        /// Target namespace (falls back to 'default' when unknown to the cluster)
        #[arg(short, long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,

        /// Write the sealed manifest here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Accept the namespace as given instead of checking it against the cluster
        #[arg(long)]
        skip_namespace_check: bool,

        /// Secret base name; the Secret is named '<base>-secret'
        #[arg(long, env = "SECRET_BASE_NAME")]
        secret_base_name: Option<String>,

        /// Working directory for intermediate and sealed files
        #[arg(long, env = "UPLOAD_DIR")]
        upload_dir: Option<PathBuf>,

        /// Public certificate for offline sealing (kubeseal --cert)
        #[arg(long, env = "SEALED_SECRETS_CERT")]
        cert: Option<PathBuf>,

        /// Timeout for each kubectl/kubeseal invocation, in seconds
        #[arg(long, env = "TOOL_TIMEOUT_SECS")]
        timeout_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    });

    match cli.command {
        Commands::Validate { file } => validate_command(&file).await,
        Commands::Seal {
            file,
            namespace,
            output,
            skip_namespace_check,
            secret_base_name,
            upload_dir,
            cert,
            timeout_secs,
        } => {
            let mut config = ServerConfig::from_env();
            if let Some(base) = secret_base_name {
                config.secret_base_name = base;
            }
            if let Some(dir) = upload_dir {
                config.upload_dir = dir;
            }
            if cert.is_some() {
                config.sealing_cert = cert;
            }
            if let Some(secs) = timeout_secs {
                config.tool_timeout_secs = secs;
            }
            seal_command(
                &config,
                &file,
                &namespace,
                output.as_deref(),
                skip_namespace_check,
            )
            .await
        }
    }
}

async fn validate_command(file: &std::path::Path) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let env = validate(text.trim()).with_context(|| format!("{} is not valid", file.display()))?;

    println!("✅ {} keys", env.len());
    for key in env.keys() {
        println!("  {key}");
    }
    Ok(())
}

async fn seal_command(
    config: &ServerConfig,
    file: &std::path::Path,
    namespace: &str,
    output: Option<&std::path::Path>,
    skip_namespace_check: bool,
) -> Result<()> {
    // Required for rustls 0.23+ before the Kubernetes client opens a connection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let storage = WorkingStorage::open(&config.upload_dir).with_context(|| {
        format!(
            "Failed to create working directory {}",
            config.upload_dir.display()
        )
    })?;

    let namespaces: Arc<dyn NamespaceSource> = if skip_namespace_check {
        Arc::new(StaticNamespaces(vec![namespace.to_string()]))
    } else {
        Arc::new(KubeNamespaceSource::connect().await)
    };

    let pipeline = Pipeline::new(
        SecretManifestBuilder::new(
            Arc::new(config.manifest_generator()),
            storage.clone(),
            config.secret_base_name.clone(),
        ),
        SecretSealer::new(Arc::new(config.sealer()), storage),
        namespaces,
        config.secret_base_name.clone(),
    );

    let sealed = pipeline
        .submit(&text, namespace)
        .await
        .with_context(|| format!("Failed to seal {}", file.display()))?;

    match output {
        Some(path) => {
            tokio::fs::write(path, &sealed.yaml)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("✅ Sealed secret written to {}", path.display());
        }
        None => print!("{}", sealed.yaml),
    }
    Ok(())
}
