use anyhow::{anyhow, Result};
use colored::*;
use openssl::nid::Nid;
use openssl::x509::X509Ref;
use policy_agent::AgentConfig;
use secure_channel::{
    CredentialFileResolver, ResourceDirSource, StoreLocator, TlsContext, TlsContextBuilder,
};
use std::sync::Arc;

/// Build the TLS context the agent would use and describe it
pub fn check(config: &AgentConfig, format: String) -> Result<()> {
    let ssl = config.secure_channel()?;

    let mut locator = StoreLocator::default();
    if !config.resource_dirs.is_empty() {
        locator = locator.with_source(ResourceDirSource::new(config.resource_dirs.clone()));
    }
    let builder =
        TlsContextBuilder::new(Arc::new(CredentialFileResolver::new())).with_locator(locator);

    let context = builder.build(&ssl).ok_or_else(|| {
        anyhow!("TLS context could not be initialized; see the log for the failing store")
    })?;

    let summary = summarize(&context);
    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => print_summary_text(&summary),
    }

    Ok(())
}

fn summarize(context: &TlsContext) -> serde_json::Value {
    let client_certificate = context.key_material().map(|key| {
        serde_json::json!({
            "subject": common_name(key.certificate()),
            "chain_length": key.chain().len(),
        })
    });
    let trust_anchors: Vec<String> = context
        .trust_material()
        .anchors()
        .iter()
        .map(|cert| common_name(cert))
        .collect();

    serde_json::json!({
        "mutual": context.is_mutual(),
        "client_certificate": client_certificate,
        "trust_anchors": trust_anchors,
    })
}

fn common_name(cert: &X509Ref) -> String {
    cert.subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|name| name.to_string())
        .unwrap_or_else(|| "<no common name>".to_string())
}

fn print_summary_text(summary: &serde_json::Value) {
    println!("{}", "=== TLS Context ===".bold());
    println!();

    let mode = if summary["mutual"].as_bool().unwrap_or(false) {
        "mutual (client certificate presented)".green()
    } else {
        "server authentication only".yellow()
    };
    println!("{}: {}", "Mode".bold(), mode);

    if let Some(subject) = summary["client_certificate"]["subject"].as_str() {
        println!("{}: {}", "Client certificate".bold(), subject.cyan());
    }

    if let Some(anchors) = summary["trust_anchors"].as_array() {
        println!("{}: {}", "Trust anchors".bold(), anchors.len());
        for anchor in anchors {
            println!("  - {}", anchor.as_str().unwrap_or_default());
        }
    }
}
