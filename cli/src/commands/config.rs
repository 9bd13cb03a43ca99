use anyhow::Result;
use colored::*;
use policy_agent::AgentConfig;
use std::path::Path;

/// Print the effective configuration
pub fn show(config_path: &Path, config: &AgentConfig, format: String) -> Result<()> {
    let value = serde_yaml::to_value(config)?;

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        "yaml" => {
            print!("{}", serde_yaml::to_string(&value)?);
        }
        _ => {
            println!("{}", "=== Agent Configuration ===".bold());
            println!("{}: {}", "File".bold(), config_path.display().to_string().green());
            println!();
            print_yaml_value(&value, 0);
        }
    }

    Ok(())
}

/// Recursively print a YAML value with indentation
pub fn print_yaml_value(value: &serde_yaml::Value, indent_level: usize) {
    let indent = "  ".repeat(indent_level);

    match value {
        serde_yaml::Value::Null => {
            println!("{}{}", indent, "unset".dimmed());
        }
        serde_yaml::Value::Bool(b) => {
            println!("{}{}", indent, b.to_string().blue());
        }
        serde_yaml::Value::Number(n) => {
            println!("{}{}", indent, n.to_string().magenta());
        }
        serde_yaml::Value::String(s) => {
            // Paths and URLs stand out
            if s.contains('/') || s.contains('\\') {
                println!("{}{}", indent, s.green());
            } else {
                println!("{}{}", indent, s.yellow());
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            if seq.is_empty() {
                println!("{}[]", indent);
            }
            for item in seq {
                print!("{}- ", indent);
                print_yaml_value(item, 0);
            }
        }
        serde_yaml::Value::Mapping(map) => {
            for (key, val) in map {
                let key = match key {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => format!("{:?}", other),
                };
                print!("{}{}: ", indent, key.cyan());

                match val {
                    serde_yaml::Value::Mapping(_) => {
                        println!();
                        print_yaml_value(val, indent_level + 1);
                    }
                    serde_yaml::Value::Sequence(seq) if !seq.is_empty() => {
                        println!();
                        print_yaml_value(val, indent_level + 1);
                    }
                    _ => print_yaml_value(val, 0),
                }
            }
        }
        serde_yaml::Value::Tagged(tagged) => {
            println!("{}!{} ", indent, tagged.tag);
            print_yaml_value(&tagged.value, indent_level + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serializes_for_display() {
        let config = AgentConfig::from_yaml(
            "policy_url: file:///tmp/policy.json\ncache_file: /tmp/cache.json\n",
        )
        .unwrap();

        let value = serde_yaml::to_value(&config).unwrap();
        let map = value.as_mapping().unwrap();
        assert_eq!(
            map.get("policy_url").and_then(|v| v.as_str()),
            Some("file:///tmp/policy.json")
        );
        assert_eq!(
            map.get("refresh_interval_secs").and_then(|v| v.as_i64()),
            Some(30)
        );
    }
}
