use anyhow::{anyhow, Result};
use colored::*;
use policy_agent::{
    Agent, AgentConfig, LoggingListener, PolicyChangeListener, RefreshOutcome, ShutdownSignal,
};
use policy_cache::PolicySnapshot;
use secure_channel::CredentialFileResolver;
use std::sync::Arc;
use tracing::info;

/// Run the agent until interrupted, or perform a single refresh with `once`
pub async fn execute(config: AgentConfig, once: bool) -> Result<()> {
    let listener: Arc<dyn PolicyChangeListener> = if once {
        Arc::new(|snapshot: &PolicySnapshot| {
            println!(
                "{} {} ({} policies)",
                "Policies updated for".green(),
                snapshot.repository_name.cyan(),
                snapshot.policies.len()
            );
        })
    } else {
        Arc::new(LoggingListener)
    };

    let agent = Agent::new(
        config,
        Arc::new(CredentialFileResolver::new()),
        listener,
        None,
    )?;

    if once {
        return match agent.refresher().refresh(&ShutdownSignal::never()).await {
            RefreshOutcome::Failed => Err(anyhow!(
                "Policy refresh from {} failed",
                agent.config().policy_url
            )),
            RefreshOutcome::Unchanged => {
                println!("{}", "Policies unchanged".yellow());
                Ok(())
            }
            _ => Ok(()),
        };
    }

    let running = agent.start()?;
    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, shutting down");
    running.shutdown().await;

    Ok(())
}
