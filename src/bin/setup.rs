//! butlerbot setup wizard.
//!
//! Asks for the Telegram bot token and the document backend settings on the
//! terminal and writes `config.toml` to the project root. Pass `--print` to
//! write the config to stdout instead.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::PathBuf;

// ── Config formatting ──────────────────────────────────────────────────────────

enum BackendParams<'a> {
    Github {
        token: &'a str,
        repository: &'a str,
        path: &'a str,
        branch: &'a str,
    },
    GoogleDocs {
        document_id: &'a str,
        credentials_path: &'a str,
    },
}

struct ConfigParams<'a> {
    tg_token: &'a str,
    backend: BackendParams<'a>,
}

/// Quote a value as a TOML basic string.
fn toml_str(value: &str) -> String {
    toml::Value::String(value.to_owned()).to_string()
}

/// Produces a valid config.toml string. Extracted so it can be unit-tested.
fn format_config(p: &ConfigParams<'_>) -> String {
    let tg_token = toml_str(p.tg_token);

    let backend = match &p.backend {
        BackendParams::Github {
            token,
            repository,
            path,
            branch,
        } => {
            let branch_line = if branch.is_empty() {
                "# branch = \"main\"".to_owned()
            } else {
                format!("branch = {}", toml_str(branch))
            };
            format!(
                "kind = \"github\"\ntoken = {}\nrepository = {}\npath = {}\n{branch_line}\n",
                toml_str(token),
                toml_str(repository),
                toml_str(path),
            )
        }
        BackendParams::GoogleDocs {
            document_id,
            credentials_path,
        } => format!(
            "kind = \"google_docs\"\ndocument_id = {}\ncredentials_path = {}\n",
            toml_str(document_id),
            toml_str(credentials_path),
        ),
    };

    format!(
        r#"[telegram]
bot_token = {tg_token}

[backend]
{backend}"#
    )
}

// ── Wizard ─────────────────────────────────────────────────────────────────────

fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut buf = String::new();
    io::stdin().read_line(&mut buf)?;
    Ok(buf.trim().to_owned())
}

fn or_default(s: String, default: &str) -> String {
    if s.is_empty() {
        default.to_owned()
    } else {
        s
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let print_only = args.iter().any(|a| a == "--print");

    // Resolve project root: prefer BUTLERBOT_ROOT env, fall back to cwd.
    let project_root =
        PathBuf::from(std::env::var("BUTLERBOT_ROOT").unwrap_or_else(|_| ".".to_string()));

    println!("=== butlerbot setup ===\n");

    let tg_token = read_line("Telegram bot token: ")?;
    let kind = or_default(
        read_line("Backend (github / google_docs) [github]: ")?,
        "github",
    );

    let (gh_token, repository, path, branch, document_id, credentials_path);
    let backend = match kind.as_str() {
        "github" => {
            gh_token = read_line("GitHub token: ")?;
            repository = read_line("Repository (owner/name): ")?;
            path = or_default(read_line("File path [README.md]: ")?, "README.md");
            branch = read_line("Branch (optional): ")?;
            BackendParams::Github {
                token: &gh_token,
                repository: &repository,
                path: &path,
                branch: &branch,
            }
        }
        "google_docs" => {
            document_id = read_line("Google document ID: ")?;
            credentials_path = or_default(
                read_line("Service account key file [service-account.json]: ")?,
                "service-account.json",
            );
            BackendParams::GoogleDocs {
                document_id: &document_id,
                credentials_path: &credentials_path,
            }
        }
        other => anyhow::bail!("Unknown backend \"{other}\""),
    };

    let config = format_config(&ConfigParams {
        tg_token: &tg_token,
        backend,
    });

    if print_only {
        print!("{config}");
        return Ok(());
    }

    let config_path = project_root.join("config.toml");
    std::fs::write(&config_path, &config)
        .with_context(|| format!("Could not write {}", config_path.display()))?;

    println!("\n✓  config.toml saved to {}", config_path.display());
    println!("   Run the bot with:  cargo run");
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
