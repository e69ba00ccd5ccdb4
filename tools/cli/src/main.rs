//! docseal CLI - password-protected document versions.
//!
//! Manages a catalog directory (`catalog.json` plus a content store) and
//! serves it over HTTP.

mod workspace;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use docseal_catalog::{DocumentRepository, Permission};
use docseal_common::{DocumentId, Identity, Password, VersionId};
use docseal_server::AppState;
use docseal_service::{CallerContext, PublishRequest};
use docseal_storage::ByteStream;
use workspace::Workspace;

#[derive(Parser)]
#[command(name = "docseal")]
#[command(about = "docseal - Password-protected document versions")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Catalog directory.
    #[arg(short, long, default_value = ".docseal")]
    root: PathBuf,

    /// Service configuration file (JSON).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new document.
    NewDocument {
        /// Owning user id.
        #[arg(short, long)]
        owner: String,

        /// Document title.
        #[arg(short, long)]
        title: String,
    },

    /// Grant a user a permission on a document.
    Grant {
        #[arg(short, long)]
        document: String,

        #[arg(short, long)]
        user: String,

        #[arg(short, long, value_enum)]
        permission: PermissionArg,
    },

    /// Publish a file as the next version of a document.
    Protect {
        #[arg(short, long)]
        document: String,

        /// File to publish.
        #[arg(short, long)]
        file: PathBuf,

        /// Media type (guessed from the extension by default).
        #[arg(short, long)]
        media_type: Option<String>,

        /// Publish without a password.
        #[arg(long)]
        unprotected: bool,
    },

    /// Publish a version again under a new password.
    Reprotect {
        #[arg(short, long)]
        version: String,

        /// Publish the new revision without a password.
        #[arg(long)]
        unprotected: bool,
    },

    /// Download a version's content.
    Download {
        #[arg(short, long)]
        version: String,

        /// Acting user id.
        #[arg(short, long)]
        user: String,

        /// Output file (defaults to the stored file name).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show version metadata.
    Details {
        #[arg(short, long)]
        version: String,

        /// Acting user id.
        #[arg(short, long)]
        user: String,
    },

    /// List the versions of a document.
    Versions {
        #[arg(short, long)]
        document: String,
    },

    /// Serve the catalog over HTTP.
    Serve {
        /// Listen address (overrides the config file).
        #[arg(short, long)]
        listen: Option<SocketAddr>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PermissionArg {
    View,
    Download,
}

impl From<PermissionArg> for Permission {
    fn from(arg: PermissionArg) -> Self {
        match arg {
            PermissionArg::View => Permission::View,
            PermissionArg::Download => Permission::Download,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let workspace = Workspace::open(&cli.root, cli.config.as_deref()).await?;

    match cli.command {
        Commands::NewDocument { owner, title } => cmd_new_document(&workspace, &owner, &title).await,

        Commands::Grant {
            document,
            user,
            permission,
        } => cmd_grant(&workspace, &document, &user, permission.into()).await,

        Commands::Protect {
            document,
            file,
            media_type,
            unprotected,
        } => cmd_protect(&workspace, &document, &file, media_type, unprotected).await,

        Commands::Reprotect {
            version,
            unprotected,
        } => cmd_reprotect(&workspace, &version, unprotected).await,

        Commands::Download {
            version,
            user,
            output,
        } => cmd_download(&workspace, &version, &user, output).await,

        Commands::Details { version, user } => cmd_details(&workspace, &version, &user).await,

        Commands::Versions { document } => cmd_versions(&workspace, &document).await,

        Commands::Serve { listen } => cmd_serve(workspace, listen).await,
    }
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<Password> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Password::from(password))
}

/// Prompt for a new password twice.
fn prompt_new_password() -> Result<Password> {
    let password = prompt_password("Enter document password: ")?;
    let confirm = prompt_password("Confirm document password: ")?;

    if password.expose() != confirm.expose() {
        anyhow::bail!("Passwords do not match");
    }
    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }
    Ok(password)
}

fn parse_document(id: &str) -> Result<DocumentId> {
    DocumentId::parse(id).context("Invalid document id")
}

fn parse_version(id: &str) -> Result<VersionId> {
    VersionId::parse(id).context("Invalid version id")
}

fn parse_user(id: &str) -> Result<Identity> {
    Identity::new(id).context("Invalid user id")
}

/// Register a new document.
async fn cmd_new_document(workspace: &Workspace, owner: &str, title: &str) -> Result<()> {
    let owner = parse_user(owner)?;
    let document = workspace.catalog.create_document(&owner, title).await;
    workspace.save().await?;

    println!("Document created: {}", document);
    Ok(())
}

/// Grant a permission.
async fn cmd_grant(
    workspace: &Workspace,
    document: &str,
    user: &str,
    permission: Permission,
) -> Result<()> {
    let document = parse_document(document)?;
    let user = parse_user(user)?;

    workspace
        .catalog
        .grant(&document, &user, permission)
        .await
        .context("Failed to grant permission")?;
    workspace.save().await?;

    println!("Granted {} on {} to {}", permission, document, user);
    Ok(())
}

/// Publish a file as a new version.
async fn cmd_protect(
    workspace: &Workspace,
    document: &str,
    file: &Path,
    media_type: Option<String>,
    unprotected: bool,
) -> Result<()> {
    let document_id = parse_document(document)?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .context("File name must be valid UTF-8")?
        .to_string();

    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let password = if unprotected {
        None
    } else {
        Some(prompt_new_password()?)
    };

    info!(document_id = %document_id, file = %file.display(), "Publishing version");
    let details = workspace
        .publisher()?
        .publish_version(PublishRequest {
            document_id,
            file_name,
            media_type,
            page_count: None,
            content,
            password,
        })
        .await
        .context("Failed to publish version")?;
    workspace.save().await?;

    println!("Version published: {}", details.id);
    println!("  Number: {}", details.number);
    println!("  Size: {} bytes", details.size);
    println!("  Protected: {}", details.is_password_protected);
    Ok(())
}

/// Publish an existing version under a new password.
async fn cmd_reprotect(workspace: &Workspace, version: &str, unprotected: bool) -> Result<()> {
    let version_id = parse_version(version)?;
    let record = workspace
        .catalog
        .load_version(&version_id)
        .await
        .context("Failed to load version")?;

    let current = if record.protection.is_password_protected {
        Some(prompt_password("Enter current password: ")?)
    } else {
        None
    };
    let password = if unprotected {
        None
    } else {
        Some(prompt_new_password()?)
    };

    let details = workspace
        .publisher()?
        .republish(&version_id, current, password)
        .await
        .context("Failed to republish version")?;
    workspace.save().await?;

    println!("Version published: {}", details.id);
    println!("  Number: {}", details.number);
    println!("  Protected: {}", details.is_password_protected);
    Ok(())
}

/// Download a version to a local file.
async fn cmd_download(
    workspace: &Workspace,
    version: &str,
    user: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let version_id = parse_version(version)?;
    let caller = CallerContext::new(parse_user(user)?);
    let gateway = workspace.gateway()?;

    let details = gateway
        .details(&caller, version_id)
        .await
        .context("Failed to read version")?;
    let password = if details.is_password_protected {
        Some(prompt_password("Enter document password: ")?)
    } else {
        None
    };

    let response = gateway
        .download(&caller, version_id, password)
        .await
        .context("Download failed")?;

    let output = output.unwrap_or_else(|| PathBuf::from(&response.file_name));
    let written = write_output(&output, response.body).await?;

    println!("Downloaded {} ({} bytes)", output.display(), written);
    Ok(())
}

/// Stream `body` into a temp file beside `output`, then rename it into place.
///
/// A failed stream leaves neither `output` nor the temp file behind.
async fn write_output(output: &Path, mut body: ByteStream) -> Result<u64> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let partial = tempfile::Builder::new()
        .prefix(".docseal-")
        .suffix(".part")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?
        .into_temp_path();

    let mut file = tokio::fs::File::create(&partial)
        .await
        .context("Failed to open temp file")?;
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.context("Failed to read content")?;
        file.write_all(&chunk)
            .await
            .context("Failed to write output file")?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    partial
        .persist(output)
        .with_context(|| format!("Failed to move download to {}", output.display()))?;
    Ok(written)
}

/// Print version metadata.
async fn cmd_details(workspace: &Workspace, version: &str, user: &str) -> Result<()> {
    let version_id = parse_version(version)?;
    let caller = CallerContext::new(parse_user(user)?);

    let details = workspace
        .gateway()?
        .details(&caller, version_id)
        .await
        .context("Failed to read version")?;

    println!("{}", serde_json::to_string_pretty(&details)?);
    Ok(())
}

/// List versions of a document.
async fn cmd_versions(workspace: &Workspace, document: &str) -> Result<()> {
    let document_id = parse_document(document)?;
    let versions = workspace
        .catalog
        .versions(&document_id)
        .await
        .context("Failed to list versions")?;

    if versions.is_empty() {
        println!("No versions.");
        return Ok(());
    }
    for version in versions {
        let lock = if version.is_password_protected { " [protected]" } else { "" };
        println!(
            "  v{} {} {} ({} bytes){}",
            version.number, version.id, version.file_name, version.size, lock
        );
    }
    Ok(())
}

/// Serve the workspace over HTTP.
async fn cmd_serve(workspace: Workspace, listen: Option<SocketAddr>) -> Result<()> {
    let addr = listen.unwrap_or(workspace.config.server.listen);
    if workspace.config.server.tokens.is_empty() {
        warn!("No bearer tokens configured; every request will be rejected");
    }

    let state = AppState::from_config(
        &workspace.config,
        Arc::new(workspace.catalog.clone()),
        Arc::new(workspace.catalog.clone()),
        workspace.store.clone(),
    )
    .context("Failed to build server state")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    docseal_server::serve(listener, state)
        .await
        .context("Server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use docseal_common::Error;
    use futures::stream;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("report.pdf");
        let chunks: Vec<Result<Vec<u8>, Error>> = vec![Ok(b"%PDF".to_vec()), Ok(b"-1.7".to_vec())];
        let body: ByteStream = Box::pin(stream::iter(chunks));

        let written = write_output(&output, body).await.unwrap();

        assert_eq!(written, 8);
        assert_eq!(std::fs::read(&output).unwrap(), b"%PDF-1.7");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_failed_stream_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("report.pdf");
        let chunks: Vec<Result<Vec<u8>, Error>> = vec![
            Ok(b"partial".to_vec()),
            Err(Error::Storage("connection reset".to_string())),
        ];
        let body: ByteStream = Box::pin(stream::iter(chunks));

        assert!(write_output(&output, body).await.is_err());

        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_stream_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("report.pdf");
        std::fs::write(&output, b"old copy").unwrap();
        let chunks: Vec<Result<Vec<u8>, Error>> = vec![Err(Error::Storage("gone".to_string()))];
        let body: ByteStream = Box::pin(stream::iter(chunks));

        assert!(write_output(&output, body).await.is_err());

        assert_eq!(std::fs::read(&output).unwrap(), b"old copy");
    }
}
