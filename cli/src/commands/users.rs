use anyhow::{anyhow, Result};
use colored::*;
use std::path::Path;
use usersync::{push_to_sink, LoggingSink, ReadOutcome, SourceReader, UserGroupMapping};

/// Read a user/group source once and print the mapping it yields
pub fn execute(file: &Path, delimiter: &str, format: String, push: bool) -> Result<()> {
    let delimiter = single_char(delimiter)?;
    let mut reader = SourceReader::new(file, delimiter);

    let mapping = match reader.read()? {
        ReadOutcome::Changed(mapping) => mapping,
        // A fresh reader always parses on its first read
        ReadOutcome::Unchanged => UserGroupMapping::new(),
    };
    mapping.log_debug();

    if push {
        push_to_sink(&mapping, &mut LoggingSink)?;
    }

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&mapping)?),
        "yaml" => print!("{}", serde_yaml::to_string(&mapping)?),
        _ => {
            println!(
                "{} {} ({:?})",
                "=== Users and groups from".bold(),
                file.display().to_string().green(),
                reader.format()
            );
            for (user, groups) in mapping.iter() {
                println!("{}: {}", user.cyan(), groups.join(", "));
            }
            println!("{}", format!("Total users: {}", mapping.len()).green());
        }
    }

    Ok(())
}

fn single_char(delimiter: &str) -> Result<char> {
    let mut chars = delimiter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(anyhow!(
            "Delimiter must be a single character, got {:?}",
            delimiter
        )),
    }
}
