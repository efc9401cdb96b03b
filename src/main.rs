//! Wargame Timeline - session driver
//!
//! Operates on a saved session file: every command loads the timeline,
//! applies one operation through the branch manager, and saves it back.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

use wargame_timeline::battle::BattlefieldState;
use wargame_timeline::core::error::{AdvanceError, EngineError, Result};
use wargame_timeline::core::types::NodeId;
use wargame_timeline::gateway::{
    CandidatePayload, DoctrineParams, GenerationGateway, LlmGateway, ScriptedGateway,
};
use wargame_timeline::session::{BranchManager, ScenarioSession};
use wargame_timeline::timeline::{ScenarioMeta, TimelineDocument};
use wargame_timeline::{EngineConfig, TerrainGrid, ValidationResult};

/// Branchable wargame timeline driver
#[derive(Parser, Debug)]
#[command(name = "wargame-timeline")]
#[command(about = "Grow, branch and rewind validated wargame timelines")]
struct Args {
    /// Session file (JSON timeline document)
    session: PathBuf,

    /// Engine configuration (TOML)
    #[arg(long, default_value = "data/engine.toml")]
    config: PathBuf,

    /// Replay gateway steps from this JSON file instead of calling an LLM
    #[arg(long)]
    script: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new session from a scenario payload, or generate one from --context
    Init {
        /// JSON payload with terrain and units
        #[arg(long)]
        scenario: Option<PathBuf>,
        #[arg(long, default_value = "Untitled scenario")]
        title: String,
        #[command(flatten)]
        doctrine: DoctrineArgs,
    },
    /// Generate the next turn after the active node
    Advance {
        #[command(flatten)]
        doctrine: DoctrineArgs,
    },
    /// Generate a new child of an existing node
    Branch {
        node: u64,
        #[command(flatten)]
        doctrine: DoctrineArgs,
    },
    /// Generate a fresh sibling of a node
    Regenerate {
        node: u64,
        #[command(flatten)]
        doctrine: DoctrineArgs,
    },
    /// Commit a hand-edited next turn (JSON payload)
    Edit { payload: PathBuf },
    /// Start over on new terrain (JSON grid of terrain codes)
    Terrain { grid: PathBuf },
    /// Move the active pointer to a node
    Rewind { node: u64 },
    /// Move the active pointer to its parent
    Back,
    /// Move the active pointer to its newest child
    Forward,
    /// Delete a subtree not holding the active pointer
    Prune { node: u64 },
    /// Re-validate the branch ending at a node (defaults to the active node)
    Audit { node: Option<u64> },
    /// Print the active branch
    Show,
}

#[derive(clap::Args, Debug)]
struct DoctrineArgs {
    /// Doctrine or intent for the generator
    #[arg(long, default_value = "")]
    doctrine: String,
    /// Research context for the scenario
    #[arg(long, default_value = "")]
    context: String,
    #[arg(long)]
    seed: Option<u64>,
}

impl DoctrineArgs {
    fn params(&self) -> DoctrineParams {
        let params = DoctrineParams::new(self.doctrine.clone()).with_context(self.context.clone());
        match self.seed {
            Some(seed) => params.with_seed(seed),
            None => params,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wargame_timeline=info".into()),
        )
        .init();

    let args = Args::parse();
    let rt = Runtime::new()?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args.config)?;

    if let Command::Init {
        scenario,
        title,
        doctrine,
    } = &args.command
    {
        let meta = ScenarioMeta::new(title.clone());
        let manager = match scenario {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                let payload: CandidatePayload = serde_json::from_str(&content)?;
                let initial = payload
                    .into_root_state()
                    .map_err(AdvanceError::InvalidRoot)?;
                BranchManager::new(initial, config.clone(), gateway(&args, &config, false)?, meta)?
            }
            None if doctrine.context.trim().is_empty() => {
                return Err(EngineError::Config(
                    "init needs --scenario <file> or a research --context to generate from".into(),
                ));
            }
            None => {
                tracing::info!("Generating opening scenario for '{}'", doctrine.context);
                BranchManager::generate(
                    config.clone(),
                    gateway(&args, &config, true)?,
                    &doctrine.params(),
                    meta,
                )
                .await?
            }
        };
        manager.to_document()?.save(&args.session)?;
        print_branch(&manager)?;
        return Ok(());
    }

    let generates = matches!(
        args.command,
        Command::Advance { .. } | Command::Branch { .. } | Command::Regenerate { .. }
    );
    let document = TimelineDocument::load(&args.session)?;
    let manager =
        BranchManager::from_document(document, config.clone(), gateway(&args, &config, generates)?)?;
    let session = ScenarioSession::new(manager);

    match &args.command {
        Command::Init { .. } => {}
        Command::Advance { doctrine } => {
            let id = session.advance(&doctrine.params()).await?;
            println!("Committed {}", id);
        }
        Command::Branch { node, doctrine } => {
            let id = session.branch_from(NodeId(*node), &doctrine.params()).await?;
            println!("Branched {} from #{}", id, node);
        }
        Command::Regenerate { node, doctrine } => {
            let id = session.regenerate(NodeId(*node), &doctrine.params()).await?;
            println!("Regenerated #{} as {}", node, id);
        }
        Command::Edit { payload } => {
            let content = std::fs::read_to_string(payload)?;
            let payload: CandidatePayload = serde_json::from_str(&content)?;
            let current = session.view().active_state()?.clone();
            let edited = payload
                .into_state(&current)
                .map_err(AdvanceError::EditRejected)?;
            let id = session.submit_edit(edited).await?;
            println!("Committed edit {}", id);
        }
        Command::Terrain { grid } => {
            let content = std::fs::read_to_string(grid)?;
            let codes: Vec<Vec<u8>> = serde_json::from_str(&content)?;
            let root = session.regenerate_terrain(TerrainGrid::from_codes(&codes)).await?;
            let archived = session.view().archive.len();
            println!(
                "New root {} on fresh terrain; {} earlier timeline(s) kept in the archive",
                root, archived
            );
        }
        Command::Rewind { node } => {
            session.rewind(NodeId(*node)).await?;
        }
        Command::Back => {
            if session.step_back().await?.is_none() {
                println!("Already at the scenario root");
            }
        }
        Command::Forward => {
            if session.step_forward().await?.is_none() {
                println!("No later turn on this branch");
            }
        }
        Command::Prune { node } => {
            let removed = session.prune(NodeId(*node)).await?;
            println!("Pruned {} nodes", removed.len());
        }
        Command::Audit { node } => {
            let target = node.map(NodeId).unwrap_or(session.view().active);
            for entry in session.audit(target).await? {
                match entry.result {
                    ValidationResult::Accept { warnings } if warnings.is_empty() => {
                        println!("{}: ok", entry.node)
                    }
                    ValidationResult::Accept { warnings } => {
                        println!("{}: ok with {} warnings", entry.node, warnings.len())
                    }
                    ValidationResult::Reject(violations) => {
                        println!("{}: REJECTED", entry.node);
                        for violation in violations {
                            println!("    {}", violation);
                        }
                    }
                }
            }
        }
        Command::Show => {}
    }

    session.save(&args.session).await?;
    let manager = session.into_manager();
    print_branch(&manager)?;
    Ok(())
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    let config = if path.exists() {
        EngineConfig::load(path)?
    } else {
        tracing::warn!("{} not found - using default configuration", path.display());
        EngineConfig::default()
    };
    config.validate().map_err(EngineError::Config)?;
    Ok(config)
}

fn gateway(
    args: &Args,
    config: &EngineConfig,
    generates: bool,
) -> Result<Box<dyn GenerationGateway>> {
    if let Some(script) = &args.script {
        let scripted =
            ScriptedGateway::from_file(script).map_err(|e| EngineError::Config(e.to_string()))?;
        tracing::info!("Replaying {} scripted gateway steps", scripted.remaining());
        return Ok(Box::new(scripted));
    }
    if !generates {
        return Ok(Box::new(ScriptedGateway::default()));
    }
    let llm = LlmGateway::from_env(config).map_err(|e| EngineError::Config(e.to_string()))?;
    Ok(Box::new(llm))
}

fn print_branch(manager: &BranchManager) -> Result<()> {
    let scenario = manager.scenario();
    println!("\n=== {} ({}) ===", scenario.title, scenario.id);
    if !manager.archive().is_empty() {
        let archived: usize = manager.archive().iter().map(|old| old.timeline.len()).sum();
        println!(
            "  ({} archived timeline(s), {} nodes)",
            manager.archive().len(),
            archived
        );
    }

    for node in manager.active_path()? {
        let marker = if node.id() == manager.active() { ">" } else { " " };
        let siblings = manager.timeline().children(node.id())?.len();
        let fork = if siblings > 1 {
            format!(" [{} branches]", siblings)
        } else {
            String::new()
        };
        println!(
            "{} {} turn {}{}: {}",
            marker,
            node.id(),
            node.turn(),
            fork,
            node.state().narrative().unwrap_or("-")
        );
    }

    let state = manager.active_state()?;
    println!();
    print_map(&state);
    for unit in state.units() {
        println!(
            "  {:<10} {:<6} {:<12} {} hp {}/{} {}",
            unit.id,
            unit.faction,
            unit.kind,
            unit.position,
            unit.health,
            unit.max_health,
            unit.status
        );
    }
    Ok(())
}

fn print_map(state: &BattlefieldState) {
    let terrain = state.terrain();
    for (row, cells) in terrain.rows().iter().enumerate() {
        let line: String = cells
            .iter()
            .enumerate()
            .map(|(col, cell)| {
                let here = wargame_timeline::CellCoord::new(row as i32, col as i32);
                let occupant = state
                    .units()
                    .find(|u| u.position == here && u.is_alive())
                    .and_then(|u| u.faction.to_string().chars().next());
                occupant.unwrap_or(match cell {
                    wargame_timeline::TerrainType::Open => '.',
                    wargame_timeline::TerrainType::Water => '~',
                    wargame_timeline::TerrainType::Urban => '#',
                    wargame_timeline::TerrainType::Forest => '^',
                    wargame_timeline::TerrainType::Undefined => '?',
                })
            })
            .collect();
        println!("  {}", line);
    }
    println!();
}
