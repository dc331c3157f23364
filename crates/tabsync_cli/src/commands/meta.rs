//! Shell completions and man pages for the `tabsync` binary.
//!
//! Man pages are rendered for the top-level command and for each store
//! command, titled `tabsync-<command>`. The generator commands themselves get
//! no page.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;

use crate::Cli;

const BIN_NAME: &str = "tabsync";
const META_COMMANDS: &[&str] = &["completions", "man", "help"];

fn store_commands(root: &clap::Command) -> impl Iterator<Item = &clap::Command> {
    root.get_subcommands()
        .filter(|cmd| !META_COMMANDS.contains(&cmd.get_name()))
}

/// Names accepted by `tabsync man --page`.
pub(crate) fn page_names() -> Vec<String> {
    let root = Cli::command();
    store_commands(&root)
        .map(|cmd| cmd.get_name().to_string())
        .collect()
}

fn render(cmd: clap::Command, out: &mut impl Write) -> std::io::Result<()> {
    clap_mangen::Man::new(cmd).render(out)
}

/// Render the page for one store command, titled `tabsync-<name>`.
fn render_command_page(
    name: &str,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = Cli::command();
    let Some(cmd) = store_commands(&root).find(|cmd| cmd.get_name() == name) else {
        return Err(format!(
            "no man page for '{name}'; expected one of: {}",
            page_names().join(", ")
        )
        .into());
    };

    let cmd = cmd
        .clone()
        .display_name(format!("{BIN_NAME}-{name}"))
        .version(env!("CARGO_PKG_VERSION"));
    render(cmd, out)?;
    Ok(())
}

/// Write `tabsync.1` plus one page per store command into `dir`.
fn write_pages(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    let root_path = dir.join(format!("{BIN_NAME}.1"));
    let mut root_page = Vec::new();
    render(Cli::command(), &mut root_page)?;
    std::fs::write(&root_path, root_page)?;
    written.push(root_path);

    for name in page_names() {
        let path = dir.join(format!("{BIN_NAME}-{name}.1"));
        let mut page = Vec::new();
        render_command_page(&name, &mut page)?;
        std::fs::write(&path, page)?;
        written.push(path);
    }

    Ok(written)
}

pub(crate) fn handle_completions(
    shell: clap_complete::Shell,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, BIN_NAME, &mut std::io::stdout());
    Ok(())
}

pub(crate) fn handle_man(
    output: Option<PathBuf>,
    page: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    match (output, page) {
        (Some(dir), _) => {
            let written = write_pages(&dir)?;
            println!("Wrote {} man pages to {}", written.len(), dir.display());
        }
        (None, Some(name)) => {
            let mut stdout = std::io::stdout().lock();
            render_command_page(&name, &mut stdout)?;
        }
        (None, None) => {
            let mut stdout = std::io::stdout().lock();
            render(Cli::command(), &mut stdout)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn command_page(name: &str) -> String {
        let mut out = Vec::new();
        render_command_page(name, &mut out).expect("man rendering should succeed");
        String::from_utf8(out).expect("man output should be UTF-8")
    }

    #[test]
    fn page_names_cover_store_commands_only() {
        let names = page_names();
        for expected in [
            "create",
            "create-batch",
            "update",
            "update-batch",
            "find-update",
            "fetch",
            "poll",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
        assert!(!names.iter().any(|n| n == "man" || n == "completions"));
    }

    #[test]
    fn poll_page_documents_hook_and_correlation_field() {
        let page = command_page("poll");
        assert!(page.contains("correlation id"));
        assert!(page.contains("hook"));
    }

    #[test]
    fn find_update_page_documents_lookup_flags() {
        let page = command_page("find-update");
        assert!(page.contains("where"));
        assert!(page.contains("equals"));
    }

    #[test]
    fn unknown_page_lists_valid_names() {
        let err = render_command_page("login", &mut Vec::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("login"));
        assert!(message.contains("find-update"));
    }

    #[test]
    fn write_pages_emits_one_file_per_store_command() {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock should be after epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("tabsync-man-test-{nonce}"));

        let written = write_pages(&dir).expect("man page generation should succeed");

        assert_eq!(written.len(), page_names().len() + 1);
        assert!(dir.join("tabsync.1").exists());
        assert!(dir.join("tabsync-poll.1").exists());
        assert!(!dir.join("tabsync-man.1").exists());

        std::fs::remove_dir_all(&dir).expect("test output directory should be removable");
    }
}
