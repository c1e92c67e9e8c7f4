//! `aru doctor`: diagnose configuration, memory and tool servers.

use super::{load_config, runtime::open_memory};
use std::path::{Path, PathBuf};

/// Resolve `command` the way a spawned process would.
fn find_on_path(command: &str, path_var: Option<&std::ffi::OsStr>) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    std::env::split_paths(path_var?)
        .map(|dir| dir.join(command))
        .find(|full| full.is_file())
}

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    println!("🩺 Aru Doctor: System Diagnostics");
    println!("=================================\n");

    let mut issues = 0;

    let config = match load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("     Run `aru onboard` to write a fresh one.");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    match config.check_credentials() {
        Ok(()) => println!("  ✅ Credentials available for {}", config.default_model),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    match open_memory(&config, None).await {
        Ok(memory) => match memory.count().await {
            Ok(count) => println!("  ✅ Memory backend '{}' ({count} records)", memory.backend_name()),
            Err(e) => {
                println!("  ❌ Memory backend unreadable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Memory backend failed to open: {e:#}");
            issues += 1;
        }
    }

    let path_var = std::env::var_os("PATH");
    for server in config.mcp.servers.iter().filter(|s| s.enabled) {
        match find_on_path(&server.command, path_var.as_deref()) {
            Some(found) => println!("  ✅ MCP server '{}' ({})", server.name, found.display()),
            None => {
                println!("  ⚠️  MCP server '{}': command '{}' not found on PATH", server.name, server.command);
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_executables_in_path_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fake-server"), "").unwrap();
        let path_var = std::env::join_paths([dir.path()]).unwrap();

        let found = find_on_path("fake-server", Some(&path_var)).unwrap();
        assert_eq!(found, dir.path().join("fake-server"));
        assert!(find_on_path("missing-server", Some(&path_var)).is_none());
        assert!(find_on_path("fake-server", None).is_none());
    }

    #[test]
    fn explicit_paths_skip_the_search() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("server.sh");
        std::fs::write(&script, "").unwrap();

        let found = find_on_path(script.to_str().unwrap(), None).unwrap();
        assert_eq!(found, script);
    }
}
