use anyhow::Result;
use colored::*;
use policy_cache::{CacheInfo, PolicyCacheStore, PolicySnapshot};

/// Show the cached snapshot's summary, and optionally its policies
pub fn show(store: &PolicyCacheStore, format: String, policies: bool) -> Result<()> {
    let Some(info) = store.inspect()? else {
        println!(
            "{} {}",
            "No policy cache at".yellow(),
            store.path().display()
        );
        return Ok(());
    };
    let snapshot = if policies { store.try_load()? } else { None };

    match format.as_str() {
        "json" => {
            let output = serde_json::json!({
                "info": info,
                "snapshot": snapshot,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        "yaml" => {
            print!("{}", serde_yaml::to_string(&info)?);
            if let Some(snapshot) = &snapshot {
                print!("{}", serde_yaml::to_string(snapshot)?);
            }
        }
        _ => print_info_text(&info, snapshot.as_ref()),
    }

    Ok(())
}

/// Remove the cache file
pub fn clear(store: &PolicyCacheStore) -> Result<()> {
    if store.clear()? {
        println!("{} {}", "Removed".green(), store.path().display());
    } else {
        println!(
            "{} {}",
            "No policy cache at".yellow(),
            store.path().display()
        );
    }
    Ok(())
}

fn print_info_text(info: &CacheInfo, snapshot: Option<&PolicySnapshot>) {
    println!("{}", "=== Policy Cache ===".bold());
    println!();
    println!("{}: {}", "Path".bold(), info.path.display().to_string().green());
    println!("{}: {}", "Repository".bold(), info.repository_name.cyan());
    println!("{}: {}", "Policies".bold(), info.policy_count);
    println!("{}: {} bytes", "Size".bold(), info.size_bytes);
    if let Some(modified) = info.modified_at {
        println!("{}: {}", "Modified".bold(), modified.to_rfc3339());
    }
    println!("{}: {}", "SHA256".bold(), info.content_hash.dimmed());

    let Some(snapshot) = snapshot else {
        return;
    };

    println!();
    for rule in &snapshot.policies {
        let status = if rule.enabled {
            "enabled".green()
        } else {
            "disabled".red()
        };
        println!(
            "{} [{}{}]",
            rule.resource.cyan().bold(),
            status,
            if rule.recursive { ", recursive" } else { "" }
        );
        for permission in &rule.permissions {
            println!(
                "  {} users={:?} groups={:?}",
                permission.access_types.join(",").yellow(),
                permission.users,
                permission.groups
            );
        }
    }
}
