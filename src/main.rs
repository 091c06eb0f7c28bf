use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use wolfpack::config::DEFAULT_CONFIG_PATH;
use wolfpack::{
    Agent, AgentConfig, DecisionPipeline, Packet, RequestKind, RigPipeline, Role, logging,
};

#[derive(Serialize)]
struct Response<'a> {
    request: Option<RequestKind>,
    response: &'a str,
}

fn role_of(packet: &Packet) -> Role {
    packet
        .info
        .as_ref()
        .and_then(|info| info.role_map.get(&info.agent).copied())
        .unwrap_or(Role::Villager)
}

// Reads one JSON packet per line on stdin and answers on stdout.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = AgentConfig::load_from_file(&config_path)
        .with_context(|| format!("loading {config_path}"))?;
    logging::init(&config.log.dir, &config.agent.name, &config.log.level)?;

    let pipeline: Option<Arc<dyn DecisionPipeline>> = if config.llm.enable {
        Some(Arc::new(RigPipeline::from_env(config.llm.model.clone())?))
    } else {
        None
    };

    let mut agent = Agent::new(&config, &config.agent.name, Role::Villager, pipeline.clone())?;
    log::info!(
        "Agent {} started, pipeline enabled: {}",
        agent.name(),
        agent.pipeline_enabled()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let packet: Packet = match serde_json::from_str(&line) {
            Ok(packet) => packet,
            Err(e) => {
                log::error!("Malformed packet: {e}");
                continue;
            }
        };

        // The harness side of the lifecycle: a fresh agent per game.
        if packet.request == Some(RequestKind::Initialize) {
            if let Some(info) = &packet.info {
                logging::start_game(&info.game_id)?;
            }
            agent = Agent::new(&config, &config.agent.name, role_of(&packet), pipeline.clone())?;
        }

        agent.apply_packet(packet);
        match agent.act().await {
            Ok(Some(response)) => {
                let mut out = serde_json::to_string(&Response {
                    request: agent.request(),
                    response: &response,
                })?;
                out.push('\n');
                stdout.write_all(out.as_bytes()).await?;
                stdout.flush().await?;
            }
            Ok(None) => {}
            Err(e) => log::error!("No answer for {:?}: {e}", agent.request()),
        }

        if agent.request() == Some(RequestKind::Finish) {
            log::info!("Game finished, exiting");
            return Ok(());
        }
    }

    log::info!("Input closed, exiting");
    Ok(())
}
